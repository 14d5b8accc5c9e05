//! # Inspect Core
//!
//! 제조 검사 데이터셋의 핵심 도메인 모델입니다.
//!
//! - CSV 데이터셋 파싱과 요약
//! - 학습/테스트/시뮬레이션 날짜 구간 검증
//! - 데이터 디렉토리 저장소
//! - 설정 관리와 로깅 초기화

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod storage;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use storage::{DatasetStore, DATASET_FILE, RANGES_FILE};
pub use types::*;
