//! 행 단위 Pass/Fail 예측.

use serde::{Deserialize, Serialize};

use crate::error::{MlError, MlResult};
use crate::metrics::{round_to, sanitize};
use crate::trainer::TrainedModel;

/// 이 값을 초과하는 확률만 `Pass`로 판정합니다. 0.5는 짝수 반올림으로 0이 되어 `Fail`입니다.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// 확률 예측기 인터페이스.
///
/// 구현체는 스트리밍 태스크 사이에서 공유되므로 `Send + Sync`여야 합니다.
pub trait Predictor: Send + Sync {
    fn name(&self) -> &str;

    /// 입력 벡터의 피처 순서.
    fn feature_names(&self) -> &[String];

    /// 불량(`Response == 1`) 확률.
    fn predict_proba(&self, features: &[f64]) -> MlResult<f64>;

    /// 확률을 Pass/Fail 판정으로 변환합니다.
    fn predict_row(&self, features: &[f64]) -> MlResult<RowPrediction> {
        self.predict_proba(features).map(RowPrediction::from_probability)
    }
}

/// 판정 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "Pass",
            Verdict::Fail => "Fail",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 한 행의 예측.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowPrediction {
    pub probability: f64,
    pub label: Verdict,
}

impl RowPrediction {
    /// 확률이 [`DECISION_THRESHOLD`]를 넘으면 `Pass`.
    pub fn from_probability(probability: f64) -> Self {
        let probability = sanitize(probability);
        let label = if probability > DECISION_THRESHOLD {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        Self { probability, label }
    }

    /// 소수 넷째 자리로 반올림한 확률.
    pub fn confidence(&self) -> f64 {
        round_to(self.probability, 4)
    }
}

impl Predictor for TrainedModel {
    fn name(&self) -> &str {
        "gbdt"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &[f64]) -> MlResult<f64> {
        if features.len() != self.feature_names.len() {
            return Err(MlError::InvalidInput(format!(
                "expected {} features, got {}",
                self.feature_names.len(),
                features.len()
            )));
        }
        Ok(self.classifier.predict_proba(features))
    }
}
