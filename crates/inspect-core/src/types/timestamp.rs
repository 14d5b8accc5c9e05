//! 타임스탬프 파싱 및 포맷.
//!
//! 업로드 CSV와 API 요청에서 들어오는 다양한 날짜 문자열을 하나의
//! `NaiveDateTime`으로 정규화합니다.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// 출력용 타임스탬프 형식 (`YYYY-MM-DD HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `Timestamp` 컬럼이 없는 데이터셋에 합성 타임스탬프를 부여할 기준 시각.
pub const SYNTHETIC_EPOCH: &str = "2021-01-01 00:00:00";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// 문자열을 타임스탬프로 파싱합니다.
///
/// 지원 형식:
/// - `2021-01-03 12:30:00` (소수 초 허용)
/// - `2021-01-03T12:30:00`
/// - RFC 3339 (`2021-01-03T12:30:00+09:00`, UTC로 변환)
/// - `2021/01/03 12:30:00`
/// - `2021-01-03` (자정)
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim().trim_matches('"').trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// 문자열에서 날짜 부분만 파싱합니다.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|dt| dt.date())
}

/// 타임스탬프를 `YYYY-MM-DD HH:MM:SS` 형식으로 변환합니다.
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// 합성 타임스탬프 기준 시각.
pub fn synthetic_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}
