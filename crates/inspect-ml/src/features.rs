//! 피처 행렬과 컬럼 정렬.
//!
//! 학습 시점의 피처 순서를 기준으로, 추론 시 데이터셋 컬럼을 이름으로
//! 다시 배치합니다. 데이터셋에 없는 피처는 결측(NaN)으로 채웁니다.

use inspect_core::DataRow;
use serde::{Deserialize, Serialize};

use crate::error::{MlError, MlResult};

/// 행 우선(row-major) 피처 행렬. 결측은 NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub n_rows: usize,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// 평탄화된 값에서 행렬을 만듭니다.
    pub fn new(feature_names: Vec<String>, values: Vec<f64>) -> MlResult<Self> {
        let n_features = feature_names.len();
        if n_features == 0 {
            if !values.is_empty() {
                return Err(MlError::InvalidInput(
                    "values given for a matrix without features".into(),
                ));
            }
            return Ok(Self {
                n_rows: 0,
                n_features,
                feature_names,
                values,
            });
        }
        if values.len() % n_features != 0 {
            return Err(MlError::InvalidInput(format!(
                "{} values do not fill rows of {} features",
                values.len(),
                n_features
            )));
        }
        Ok(Self {
            n_rows: values.len() / n_features,
            n_features,
            feature_names,
            values,
        })
    }

    /// 데이터셋 행에서 행렬을 만듭니다.
    pub fn from_rows(rows: &[&DataRow], feature_names: &[String]) -> MlResult<Self> {
        let mut values = Vec::with_capacity(rows.len() * feature_names.len());
        for (i, row) in rows.iter().enumerate() {
            if row.features.len() != feature_names.len() {
                return Err(MlError::InvalidInput(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.features.len(),
                    feature_names.len()
                )));
            }
            values.extend_from_slice(&row.features);
        }
        Self::new(feature_names.to_vec(), values)
    }

    /// i번째 행.
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.n_features;
        &self.values[start..start + self.n_features]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }
}

/// 모델 피처 순서로 데이터셋 피처를 재배치합니다.
#[derive(Debug, Clone)]
pub struct FeatureAligner {
    model_features: Vec<String>,
    /// 모델 피처별 데이터셋 피처 위치
    positions: Vec<Option<usize>>,
}

impl FeatureAligner {
    pub fn new(model_features: &[String], dataset_features: &[String]) -> Self {
        let positions = model_features
            .iter()
            .map(|name| dataset_features.iter().position(|c| c == name))
            .collect();
        Self {
            model_features: model_features.to_vec(),
            positions,
        }
    }

    /// 데이터셋에 없는 모델 피처 이름.
    pub fn missing_features(&self) -> Vec<&str> {
        self.model_features
            .iter()
            .zip(&self.positions)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// 한 행을 모델 피처 순서로 정렬합니다.
    pub fn align(&self, row: &[f64]) -> Vec<f64> {
        self.positions
            .iter()
            .map(|pos| pos.and_then(|p| row.get(p).copied()).unwrap_or(f64::NAN))
            .collect()
    }
}

/// 행 라벨을 0.0/1.0으로 추출합니다.
pub fn labels(rows: &[&DataRow]) -> MlResult<Vec<f64>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            row.label
                .map(f64::from)
                .ok_or_else(|| MlError::InvalidInput(format!("row {} has no label", i)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspect_core::synthetic_epoch;

    fn row(features: Vec<f64>, label: Option<u8>) -> DataRow {
        DataRow {
            timestamp: synthetic_epoch(),
            id: None,
            label,
            features,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matrix_from_rows() {
        let a = row(vec![1.0, 2.0], Some(0));
        let b = row(vec![3.0, f64::NAN], Some(1));
        let m = FeatureMatrix::from_rows(&[&a, &b], &names(&["F1", "F2"])).unwrap();
        assert_eq!(m.n_rows, 2);
        assert_eq!(m.row(0), &[1.0, 2.0]);
        assert!(m.row(1)[1].is_nan());
    }

    #[test]
    fn test_matrix_shape_mismatch() {
        assert!(FeatureMatrix::new(names(&["a", "b"]), vec![1.0, 2.0, 3.0]).is_err());
        let a = row(vec![1.0], None);
        assert!(FeatureMatrix::from_rows(&[&a], &names(&["F1", "F2"])).is_err());
    }

    #[test]
    fn test_aligner_reorders_and_fills_missing() {
        let model = names(&["F3", "F1", "F9"]);
        let dataset = names(&["F1", "F2", "F3"]);
        let aligner = FeatureAligner::new(&model, &dataset);
        assert_eq!(aligner.missing_features(), vec!["F9"]);

        let aligned = aligner.align(&[10.0, 20.0, 30.0]);
        assert_eq!(aligned[0], 30.0);
        assert_eq!(aligned[1], 10.0);
        assert!(aligned[2].is_nan());
    }

    #[test]
    fn test_aligner_same_order() {
        let cols = names(&["F1", "F2"]);
        let aligner = FeatureAligner::new(&cols, &cols);
        assert!(aligner.missing_features().is_empty());
        assert_eq!(aligner.align(&[1.0, 2.0]), vec![1.0, 2.0]);
    }

    #[test]
    fn test_labels_require_every_row() {
        let a = row(vec![], Some(1));
        let b = row(vec![], Some(0));
        assert_eq!(labels(&[&a, &b]).unwrap(), vec![1.0, 0.0]);

        let c = row(vec![], None);
        assert!(matches!(labels(&[&a, &c]), Err(MlError::InvalidInput(_))));
    }
}
