//! API 응답과 스트림 이벤트에 쓰이는 값 포맷팅.

use chrono::{DateTime, Utc};

/// UTC 시각을 RFC3339 문자열로 변환합니다.
///
/// # 예시
///
/// ```
/// use chrono::{DateTime, Utc};
/// use inspect_api::utils::format_rfc3339;
///
/// let dt = DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z")
///     .unwrap()
///     .with_timezone(&Utc);
/// assert_eq!(format_rfc3339(&dt), "2024-01-15T10:30:00+00:00");
/// ```
#[inline]
pub fn format_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// 시뮬레이션 이벤트에 표시할 샘플 식별자.
///
/// `Id` 셀이 없거나 비어 있으면 `SAMP-<ordinal>`을 반환합니다.
/// `ordinal`은 1부터 시작합니다.
///
/// # 예시
///
/// ```
/// use inspect_api::utils::sample_id;
///
/// assert_eq!(sample_id(Some("P-001"), 1), "P-001");
/// assert_eq!(sample_id(None, 3), "SAMP-3");
/// assert_eq!(sample_id(Some("  "), 4), "SAMP-4");
/// ```
pub fn sample_id(id: Option<&str>, ordinal: usize) -> String {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("SAMP-{}", ordinal),
    }
}
