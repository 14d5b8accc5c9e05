//! 이진 분류 평가 지표.

use serde::{Deserialize, Serialize};

const PROB_EPS: f64 = 1e-15;

/// 혼동 행렬.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct ConfusionMatrix {
    #[serde(rename = "TP")]
    pub tp: usize,
    #[serde(rename = "TN")]
    pub tn: usize,
    #[serde(rename = "FP")]
    pub fp: usize,
    #[serde(rename = "FN")]
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// 0/1 라벨과 예측에서 집계합니다.
    pub fn from_labels(y_true: &[f64], y_pred: &[f64]) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t >= 0.5, p >= 0.5) {
                (true, true) => cm.tp += 1,
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }
}

/// 분류 지표 (0~1 비율). 분모가 0이면 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Self {
        let cm = ConfusionMatrix::from_labels(y_true, y_pred);
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let precision = ratio(cm.tp, cm.tp + cm.fp);
        let recall = ratio(cm.tp, cm.tp + cm.fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            accuracy: ratio(cm.tp + cm.tn, cm.total()),
            precision,
            recall,
            f1,
            confusion: cm,
        }
    }
}

/// 평균 로그 손실. 확률은 `[1e-15, 1-1e-15]`로 자릅니다.
pub fn log_loss(y_true: &[f64], probs: &[f64]) -> f64 {
    let n = y_true.len().min(probs.len());
    if n == 0 {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(probs)
        .map(|(&y, &p)| {
            let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / n as f64
}

/// 확률이 0.5를 넘으면 양성으로 보는 정확도.
pub fn accuracy(y_true: &[f64], probs: &[f64]) -> f64 {
    let n = y_true.len().min(probs.len());
    if n == 0 {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(probs)
        .filter(|(&y, &p)| (p > 0.5) == (y >= 0.5))
        .count();
    correct as f64 / n as f64
}

/// 비율을 백분율 소수 둘째 자리로 반올림합니다.
pub fn round_percent(x: f64) -> f64 {
    round_to(x * 100.0, 2)
}

/// 소수 `digits` 자리 반올림.
pub fn round_to(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).round() / factor
}

/// JSON에 실을 수 없는 값(NaN, ±inf)을 0으로 바꿉니다.
pub fn sanitize(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_and_metrics() {
        let y = [1.0, 1.0, 0.0, 0.0, 1.0];
        let p = [1.0, 0.0, 0.0, 1.0, 1.0];
        let m = ClassificationMetrics::compute(&y, &p);
        assert_eq!(
            m.confusion,
            ConfusionMatrix {
                tp: 2,
                tn: 1,
                fp: 1,
                fn_: 1
            }
        );
        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let m = ClassificationMetrics::compute(&[0.0, 0.0], &[0.0, 0.0]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn test_confusion_json_keys() {
        let json = serde_json::to_value(ConfusionMatrix {
            tp: 1,
            tn: 2,
            fp: 3,
            fn_: 4,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"TP": 1, "TN": 2, "FP": 3, "FN": 4}));
    }

    #[test]
    fn test_log_loss_clips_extremes() {
        let loss = log_loss(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(loss.is_finite());
        assert!(loss > 30.0 && loss < 40.0);
        assert!(log_loss(&[1.0], &[0.9]) < log_loss(&[1.0], &[0.6]));
        assert_eq!(log_loss(&[], &[]), 0.0);
    }

    #[test]
    fn test_rounding_and_sanitize() {
        assert_eq!(round_percent(0.123456), 12.35);
        assert_eq!(round_to(0.987654, 4), 0.9877);
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(1.5), 1.5);
    }
}
