//! 도메인 모델.
//!
//! - [`dataset`]: 업로드 CSV 파싱 결과와 요약
//! - [`date_range`]: 학습/테스트/시뮬레이션 날짜 구간, 검증, 월별 집계

pub mod dataset;
pub mod date_range;

pub use dataset::{
    DataRow, Dataset, DatasetMetadata, DatasetSummary, Schema, ID_COLUMN, LABEL_COLUMN,
    TIMESTAMP_COLUMN,
};
pub use date_range::{
    monthly_volumes, validate_ranges, DateRange, DateRangeRequest, MonthlyVolume, RangeSet,
};
