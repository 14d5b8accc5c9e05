//! 학습/테스트/시뮬레이션 날짜 범위.
//!
//! 모든 범위는 양 끝을 포함하는 달력 날짜 구간입니다. 행의 소속 여부는
//! 타임스탬프의 날짜 부분으로만 판단합니다.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::dataset::Dataset;
use crate::error::{CoreError, CoreResult};
use crate::types::parse_date;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// 양 끝 포함 날짜 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// 문자열 쌍을 파싱합니다. `name`은 에러 메시지에 사용됩니다.
    pub fn parse(name: &str, start: &str, end: &str) -> CoreResult<Self> {
        let start_date = parse_date(start).ok_or_else(|| {
            CoreError::InvalidInput(format!("{} start date is invalid: '{}'", name, start))
        })?;
        let end_date = parse_date(end).ok_or_else(|| {
            CoreError::InvalidInput(format!("{} end date is invalid: '{}'", name, end))
        })?;
        Ok(Self::new(start_date, end_date))
    }

    /// 타임스탬프의 날짜가 구간에 속하는지 확인합니다.
    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        let date = ts.date();
        date >= self.start && date <= self.end
    }

    /// 구간 길이 (일). 역전된 구간이면 0.
    pub fn days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// 날짜 범위 검증/제출 요청.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DateRangeRequest {
    #[validate(length(min = 1, message = "trainStart는 비어 있을 수 없습니다"))]
    pub train_start: String,
    #[validate(length(min = 1, message = "trainEnd는 비어 있을 수 없습니다"))]
    pub train_end: String,
    #[validate(length(min = 1, message = "testStart는 비어 있을 수 없습니다"))]
    pub test_start: String,
    #[validate(length(min = 1, message = "testEnd는 비어 있을 수 없습니다"))]
    pub test_end: String,
    #[validate(length(min = 1, message = "simStart는 비어 있을 수 없습니다"))]
    pub sim_start: String,
    #[validate(length(min = 1, message = "simEnd는 비어 있을 수 없습니다"))]
    pub sim_end: String,
    #[serde(default)]
    pub train_days: Option<i64>,
    #[serde(default)]
    pub test_days: Option<i64>,
    #[serde(default)]
    pub sim_days: Option<i64>,
}

impl DateRangeRequest {
    /// 세 구간을 파싱합니다.
    pub fn to_range_set(&self) -> CoreResult<RangeSet> {
        Ok(RangeSet {
            train: DateRange::parse("Train", &self.train_start, &self.train_end)?,
            test: DateRange::parse("Test", &self.test_start, &self.test_end)?,
            simulation: DateRange::parse("Sim", &self.sim_start, &self.sim_end)?,
        })
    }
}

/// 파싱된 세 구간. 저장 시 평탄한 JSON으로 직렬화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRanges", into = "StoredRanges")]
pub struct RangeSet {
    pub train: DateRange,
    pub test: DateRange,
    pub simulation: DateRange,
}

impl RangeSet {
    /// 검증/차트 순서대로 이름과 구간을 반환합니다.
    pub fn named(&self) -> [(&'static str, DateRange); 3] {
        [
            ("Train", self.train),
            ("Test", self.test),
            ("Sim", self.simulation),
        ]
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRanges {
    train_start: NaiveDate,
    train_end: NaiveDate,
    test_start: NaiveDate,
    test_end: NaiveDate,
    simulation_start: NaiveDate,
    simulation_end: NaiveDate,
}

impl From<StoredRanges> for RangeSet {
    fn from(s: StoredRanges) -> Self {
        Self {
            train: DateRange::new(s.train_start, s.train_end),
            test: DateRange::new(s.test_start, s.test_end),
            simulation: DateRange::new(s.simulation_start, s.simulation_end),
        }
    }
}

impl From<RangeSet> for StoredRanges {
    fn from(r: RangeSet) -> Self {
        Self {
            train_start: r.train.start,
            train_end: r.train.end,
            test_start: r.test.start,
            test_end: r.test.end,
            simulation_start: r.simulation.start,
            simulation_end: r.simulation.end,
        }
    }
}

/// 데이터셋 경계에 대해 구간을 검증하고 에러 메시지를 모읍니다.
///
/// 구간 간 겹침은 검사하지 않습니다.
pub fn validate_ranges(ranges: &RangeSet, bounds: (NaiveDate, NaiveDate)) -> Vec<String> {
    let (min, max) = bounds;
    let mut errors = Vec::new();

    for (name, range) in ranges.named() {
        if range.start < min || range.end > max {
            errors.push(format!("{} range is outside dataset boundaries.", name));
        }
        if range.start > range.end {
            errors.push(format!("{} start date must be before end date.", name));
        }
    }

    errors
}

/// 월별 구간 소속 행 수 (차트 데이터).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MonthlyVolume {
    pub month: String,
    pub year: i32,
    pub train_volume: usize,
    pub test_volume: usize,
    pub sim_volume: usize,
}

/// 월 단위로 행을 묶어 각 구간 소속 수를 계산합니다.
///
/// 한 행은 train → test → sim 순서로 처음 일치하는 구간에만 집계됩니다.
pub fn monthly_volumes(dataset: &Dataset, ranges: &RangeSet) -> Vec<MonthlyVolume> {
    let mut groups: BTreeMap<(i32, u32), [usize; 3]> = BTreeMap::new();
    let named = ranges.named();

    for row in &dataset.rows {
        let key = (row.timestamp.year(), row.timestamp.month());
        let counts = groups.entry(key).or_insert([0; 3]);
        if let Some(slot) = named.iter().position(|(_, r)| r.contains(&row.timestamp)) {
            counts[slot] += 1;
        }
    }

    groups
        .into_iter()
        .map(|((year, month), [train, test, sim])| MonthlyVolume {
            month: MONTH_NAMES[(month - 1) as usize].to_string(),
            year,
            train_volume: train,
            test_volume: test,
            sim_volume: sim,
        })
        .collect()
}
