//! 업로드된 CSV 데이터셋 모델.
//!
//! CSV를 한 번 파싱하여 행 단위 타임스탬프, 식별자, 라벨, 수치 피처를
//! 메모리에 보관합니다. 날짜 필터링, 학습, 시뮬레이션이 모두 이 구조를
//! 공유합니다.

use std::collections::HashSet;
use std::io::Read;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::domain::date_range::DateRange;
use crate::error::{CoreError, CoreResult};
use crate::types::{format_timestamp, parse_timestamp, synthetic_epoch};

/// 타임스탬프 컬럼 이름.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";
/// 샘플 식별자 컬럼 이름.
pub const ID_COLUMN: &str = "Id";
/// 이진 라벨 컬럼 이름.
pub const LABEL_COLUMN: &str = "Response";

/// 데이터셋 컬럼 구성.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// 헤더 순서 그대로의 전체 컬럼
    pub columns: Vec<String>,
    /// `Timestamp` 컬럼 위치
    pub timestamp_index: Option<usize>,
    /// `Id` 컬럼 위치
    pub id_index: Option<usize>,
    /// `Response` 컬럼 위치
    pub label_index: Option<usize>,
    /// 학습에 사용할 수치 피처 컬럼 이름
    pub feature_columns: Vec<String>,
    /// 피처 컬럼의 원본 위치
    pub feature_indices: Vec<usize>,
    /// 타임스탬프를 합성했는지 여부
    pub timestamp_synthesized: bool,
}

/// 데이터셋의 한 행.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub timestamp: NaiveDateTime,
    pub id: Option<String>,
    pub label: Option<u8>,
    /// 피처 값 (결측은 NaN)
    pub features: Vec<f64>,
}

/// 업로드 요약 (API 응답용).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub total_rows: usize,
    pub total_cols: usize,
    /// `Response == 1` 비율 (%)
    pub percent_response_equals_one: f64,
    pub start_timestamp: String,
    pub end_timestamp: String,
    /// 형식 오류로 건너뛴 행 수
    pub skipped_rows: usize,
    pub feature_count: usize,
    pub timestamp_synthesized: bool,
}

/// 데이터셋 시간 범위 메타데이터.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub start_timestamp: NaiveDateTime,
    pub end_timestamp: NaiveDateTime,
    pub total_records: usize,
}

/// 파싱된 데이터셋.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub schema: Schema,
    pub rows: Vec<DataRow>,
    pub skipped_rows: usize,
    /// 원본 바이트의 SHA-256 (hex)
    pub fingerprint: String,
}

impl Dataset {
    /// Reader에서 CSV 데이터셋을 읽습니다.
    pub fn from_reader<R: Read>(mut reader: R) -> CoreResult<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_bytes(&buf)
    }

    /// 원본 CSV 바이트에서 데이터셋을 파싱합니다.
    ///
    /// 필드 수가 헤더와 다른 행과 타임스탬프를 해석할 수 없는 행은 건너뛰고
    /// `skipped_rows`에 집계합니다.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        let fingerprint = hex::encode(Sha256::digest(bytes));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(CoreError::InvalidInput(
                "CSV contains no header row".to_string(),
            ));
        }

        let find = |name: &str| columns.iter().position(|c| c == name);
        let timestamp_index = find(TIMESTAMP_COLUMN);
        let id_index = find(ID_COLUMN);
        let label_index = find(LABEL_COLUMN);

        let candidate_indices: Vec<usize> = (0..columns.len())
            .filter(|i| {
                Some(*i) != timestamp_index && Some(*i) != id_index && Some(*i) != label_index
            })
            .collect();

        let mut non_numeric: HashSet<usize> = HashSet::new();
        let mut rows = Vec::new();
        let mut skipped_rows = 0usize;
        let epoch = synthetic_epoch();

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable CSV record");
                    skipped_rows += 1;
                    continue;
                }
            };

            if record.len() != columns.len() {
                skipped_rows += 1;
                continue;
            }

            let timestamp = match timestamp_index {
                Some(idx) => match parse_timestamp(&record[idx]) {
                    Some(ts) => ts,
                    None => {
                        skipped_rows += 1;
                        continue;
                    }
                },
                None => epoch + Duration::seconds(rows.len() as i64),
            };

            let id = id_index
                .map(|idx| record[idx].to_string())
                .filter(|v| !v.is_empty());
            let label = label_index.and_then(|idx| parse_label(&record[idx]));

            let features = candidate_indices
                .iter()
                .enumerate()
                .map(|(pos, &idx)| {
                    let cell = &record[idx];
                    if cell.is_empty() {
                        return f64::NAN;
                    }
                    match cell.parse::<f64>() {
                        Ok(v) if v.is_finite() => v,
                        Ok(_) => f64::NAN,
                        Err(_) => {
                            non_numeric.insert(pos);
                            f64::NAN
                        }
                    }
                })
                .collect();

            rows.push(DataRow {
                timestamp,
                id,
                label,
                features,
            });
        }

        if rows.is_empty() {
            return Err(CoreError::InvalidInput("CSV contains no rows".to_string()));
        }

        // 비수치 컬럼 제거
        let keep: Vec<usize> = (0..candidate_indices.len())
            .filter(|pos| !non_numeric.contains(pos))
            .collect();

        if !non_numeric.is_empty() {
            let mut dropped: Vec<&str> = non_numeric
                .iter()
                .map(|&pos| columns[candidate_indices[pos]].as_str())
                .collect();
            dropped.sort_unstable();
            warn!(columns = ?dropped, "Excluding non-numeric columns from features");

            for row in &mut rows {
                row.features = keep.iter().map(|&pos| row.features[pos]).collect();
            }
        }

        let feature_indices: Vec<usize> = keep.iter().map(|&pos| candidate_indices[pos]).collect();
        let feature_columns = feature_indices.iter().map(|&i| columns[i].clone()).collect();

        let schema = Schema {
            columns,
            timestamp_index,
            id_index,
            label_index,
            feature_columns,
            feature_indices,
            timestamp_synthesized: timestamp_index.is_none(),
        };

        debug!(
            rows = rows.len(),
            skipped = skipped_rows,
            features = schema.feature_columns.len(),
            "Dataset parsed"
        );

        Ok(Self {
            schema,
            rows,
            skipped_rows,
            fingerprint,
        })
    }

    /// 행 수.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 행이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 가장 이른/늦은 타임스탬프.
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.rows.iter().map(|r| r.timestamp).min()?;
        let max = self.rows.iter().map(|r| r.timestamp).max()?;
        Some((min, max))
    }

    /// 시간 범위 메타데이터.
    pub fn metadata(&self) -> Option<DatasetMetadata> {
        self.bounds().map(|(start, end)| DatasetMetadata {
            start_timestamp: start,
            end_timestamp: end,
            total_records: self.rows.len(),
        })
    }

    /// 양성 라벨(`Response == 1`) 행 수.
    pub fn positive_count(&self) -> usize {
        self.rows.iter().filter(|r| r.label == Some(1)).count()
    }

    /// 업로드 요약을 계산합니다.
    pub fn summary(&self) -> DatasetSummary {
        let total = self.rows.len();
        let percent = if total == 0 {
            0.0
        } else {
            self.positive_count() as f64 / total as f64 * 100.0
        };
        let (start, end) = self
            .bounds()
            .map(|(s, e)| (format_timestamp(&s), format_timestamp(&e)))
            .unwrap_or_default();

        DatasetSummary {
            total_rows: total,
            total_cols: self.schema.columns.len(),
            percent_response_equals_one: percent,
            start_timestamp: start,
            end_timestamp: end,
            skipped_rows: self.skipped_rows,
            feature_count: self.schema.feature_columns.len(),
            timestamp_synthesized: self.schema.timestamp_synthesized,
        }
    }

    /// 주어진 날짜 범위에 속하는 행 (파일 순서 유지).
    pub fn rows_in<'a>(&'a self, range: &'a DateRange) -> impl Iterator<Item = &'a DataRow> + 'a {
        self.rows.iter().filter(move |r| range.contains(&r.timestamp))
    }
}

/// 라벨 셀을 0/1로 해석합니다.
fn parse_label(cell: &str) -> Option<u8> {
    match cell.trim().parse::<f64>() {
        Ok(v) if v == 1.0 => Some(1),
        Ok(v) if v == 0.0 => Some(0),
        _ => None,
    }
}
