//! 날짜 구간 기반 학습 파이프라인.
//!
//! 학습 구간의 라벨 있는 행으로 모델을 학습하고, 테스트 구간으로 평가한 뒤
//! 보고서와 함께 [`TrainedModel`]을 만듭니다.

use std::time::Instant;

use chrono::{DateTime, Utc};
use inspect_core::{DataRow, Dataset, DateRange};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::booster::{BoosterConfig, GradientBoostedClassifier};
use crate::error::{MlError, MlResult};
use crate::features::{labels, FeatureMatrix};
use crate::metrics::{round_percent, round_to, sanitize, ClassificationMetrics, ConfusionMatrix};
use crate::predictor::DECISION_THRESHOLD;

/// 모델 저장 파일 이름.
pub const MODEL_FILE: &str = "model.json";

/// 학습/테스트 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub train: DateRange,
    pub test: DateRange,
}

/// 학습 결과 보고서.
///
/// `accuracy`~`f1Score`는 테스트 구간 기준 백분율(소수 둘째 자리)입니다.
/// 곡선(`trainLoss` 등)은 `curveRounds`의 각 라운드 수로 학습한 모델의 0~1 값입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub curve_rounds: Vec<usize>,
    pub train_accuracy: Vec<f64>,
    pub train_loss: Vec<f64>,
    pub test_accuracy: Vec<f64>,
    pub test_loss: Vec<f64>,
    pub confusion_matrix: ConfusionMatrix,
    pub train_samples: usize,
    pub test_samples: usize,
    pub feature_count: usize,
    pub rounds: usize,
    pub trained_at: DateTime<Utc>,
}

/// 저장되는 학습 산출물.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    pub id: Uuid,
    pub feature_names: Vec<String>,
    pub classifier: GradientBoostedClassifier,
    pub report: TrainingReport,
    pub ranges: TrainingRequest,
}

/// 학습기.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: BoosterConfig,
}

fn labeled_rows<'a>(dataset: &'a Dataset, range: &'a DateRange) -> Vec<&'a DataRow> {
    dataset.rows_in(range).filter(|r| r.label.is_some()).collect()
}

fn round_curve(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| round_to(sanitize(v), 6)).collect()
}

impl Trainer {
    pub fn new(config: BoosterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    /// 데이터셋을 구간별로 나눠 학습하고 평가합니다.
    pub fn train(&self, dataset: &Dataset, request: &TrainingRequest) -> MlResult<TrainedModel> {
        let started = Instant::now();
        let feature_names = dataset.schema.feature_columns.clone();
        if feature_names.is_empty() {
            return Err(MlError::InvalidInput(
                "dataset has no numeric feature columns".into(),
            ));
        }

        let train_rows = labeled_rows(dataset, &request.train);
        let test_rows = labeled_rows(dataset, &request.test);

        let unlabeled = dataset.rows_in(&request.train).count() - train_rows.len();
        if unlabeled > 0 {
            warn!(rows = unlabeled, "Dropping unlabeled rows from training range");
        }

        if train_rows.is_empty() {
            return Err(MlError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if test_rows.is_empty() {
            return Err(MlError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let train_x = FeatureMatrix::from_rows(&train_rows, &feature_names)?;
        let train_y = labels(&train_rows)?;
        let test_x = FeatureMatrix::from_rows(&test_rows, &feature_names)?;
        let test_y = labels(&test_rows)?;

        info!(
            train = %request.train,
            test = %request.test,
            train_rows = train_x.n_rows,
            test_rows = test_x.n_rows,
            features = feature_names.len(),
            "Training classifier"
        );

        let (classifier, history) = GradientBoostedClassifier::fit_with_history(
            self.config.clone(),
            &train_x,
            &train_y,
            &test_x,
            &test_y,
        )?;

        let predictions: Vec<f64> = classifier
            .predict_proba_matrix(&test_x)
            .into_iter()
            .map(|p| if p > DECISION_THRESHOLD { 1.0 } else { 0.0 })
            .collect();
        let metrics = ClassificationMetrics::compute(&test_y, &predictions);

        let report = TrainingReport {
            accuracy: round_percent(metrics.accuracy),
            precision: round_percent(metrics.precision),
            recall: round_percent(metrics.recall),
            f1_score: round_percent(metrics.f1),
            curve_rounds: history.rounds.clone(),
            train_accuracy: round_curve(&history.train_accuracy),
            train_loss: round_curve(&history.train_loss),
            test_accuracy: round_curve(&history.eval_accuracy),
            test_loss: round_curve(&history.eval_loss),
            confusion_matrix: metrics.confusion,
            train_samples: train_x.n_rows,
            test_samples: test_x.n_rows,
            feature_count: feature_names.len(),
            rounds: classifier.rounds(),
            trained_at: Utc::now(),
        };

        info!(
            accuracy = report.accuracy,
            f1 = report.f1_score,
            rounds = report.rounds,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Training completed"
        );

        Ok(TrainedModel {
            id: Uuid::new_v4(),
            feature_names,
            classifier,
            report,
            ranges: *request,
        })
    }
}
