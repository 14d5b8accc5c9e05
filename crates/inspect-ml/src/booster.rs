//! 그래디언트 부스팅 이진 분류기.
//!
//! 트리 학습과 추론은 `gbdt` 크레이트가 수행하고, 이 모듈은 [`FeatureMatrix`]와
//! 0/1 라벨을 크레이트의 `Data` 형식으로 옮깁니다.
//!
//! - 손실은 `LogLikelyhood`이며 라벨은 -1/+1로 변환합니다. 예측값은 `+1`(불량)의 확률입니다.
//! - NaN은 모든 관측값보다 작은 [`MISSING_VALUE`]로 인코딩합니다. 관측/결측을
//!   나누는 분할이 임계값 하나로 표현됩니다.

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};
use tracing::debug;

use inspect_core::TrainingConfig;

use crate::error::{MlError, MlResult};
use crate::features::FeatureMatrix;
use crate::metrics::{accuracy, log_loss, sanitize};

/// `gbdt` 손실 이름 (크레이트 표기 그대로).
const LOSS: &str = "LogLikelyhood";

/// 결측값 인코딩.
pub const MISSING_VALUE: ValueType = -1.0e30;

/// 관측값 절대값 상한. [`MISSING_VALUE`]보다 항상 큽니다.
const OBSERVED_LIMIT: f64 = 1.0e29;

/// 부스팅 하이퍼파라미터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub subsample: f64,
    pub feature_subsample: f64,
    /// 학습 곡선 측정 지점 수
    pub curve_points: usize,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for BoosterConfig {
    fn from(c: &TrainingConfig) -> Self {
        Self {
            n_estimators: c.n_estimators,
            learning_rate: c.learning_rate,
            max_depth: c.max_depth,
            min_samples_leaf: c.min_samples_leaf,
            subsample: c.subsample,
            feature_subsample: c.feature_subsample,
            curve_points: c.curve_points,
        }
    }
}

impl BoosterConfig {
    pub fn with_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    pub fn with_curve_points(mut self, points: usize) -> Self {
        self.curve_points = points;
        self
    }

    fn to_gbdt(&self, n_features: usize) -> Config {
        let mut cfg = Config::new();
        cfg.set_feature_size(n_features as _);
        cfg.set_iterations(self.n_estimators as _);
        cfg.set_shrinkage(self.learning_rate as _);
        cfg.set_max_depth(self.max_depth as _);
        cfg.set_min_leaf_size(self.min_samples_leaf.max(1) as _);
        cfg.set_data_sample_ratio(self.subsample as _);
        cfg.set_feature_sample_ratio(self.feature_subsample as _);
        cfg.set_loss(LOSS);
        cfg.set_debug(false);
        cfg.set_training_optimization_level(2);
        cfg
    }
}

/// 학습 곡선을 측정할 라운드 수 목록.
///
/// 최대 `points`개의 증가하는 값이며 마지막은 항상 `n_estimators`입니다.
pub fn checkpoints(n_estimators: usize, points: usize) -> Vec<usize> {
    let points = points.clamp(1, n_estimators.max(1));
    let mut rounds: Vec<usize> = (1..=points)
        .map(|i| (i * n_estimators).div_ceil(points))
        .collect();
    rounds.dedup();
    rounds
}

/// 측정 지점별 학습 곡선.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// 각 지점의 부스팅 라운드 수
    pub rounds: Vec<usize>,
    pub train_loss: Vec<f64>,
    pub train_accuracy: Vec<f64>,
    pub eval_loss: Vec<f64>,
    pub eval_accuracy: Vec<f64>,
}

impl TrainingHistory {
    fn record(&mut self, rounds: usize, train: (&[f64], &[f64]), eval: (&[f64], &[f64])) {
        self.rounds.push(rounds);
        self.train_loss.push(log_loss(train.0, train.1));
        self.train_accuracy.push(accuracy(train.0, train.1));
        self.eval_loss.push(log_loss(eval.0, eval.1));
        self.eval_accuracy.push(accuracy(eval.0, eval.1));
    }
}

/// 학습된 GBDT 이진 분류기.
#[derive(Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    config: BoosterConfig,
    n_features: usize,
    model: GBDT,
}

impl std::fmt::Debug for GradientBoostedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientBoostedClassifier")
            .field("config", &self.config)
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

fn encode(x: f64) -> ValueType {
    if x.is_nan() {
        MISSING_VALUE
    } else {
        x.clamp(-OBSERVED_LIMIT, OBSERVED_LIMIT) as ValueType
    }
}

fn encode_row(row: &[f64]) -> Vec<ValueType> {
    row.iter().copied().map(encode).collect()
}

fn check_labels(labels: &[f64], n_rows: usize, what: &str) -> MlResult<()> {
    if labels.len() != n_rows {
        return Err(MlError::InvalidInput(format!(
            "{} has {} rows but {} labels",
            what,
            n_rows,
            labels.len()
        )));
    }
    if let Some(bad) = labels.iter().find(|&&y| y != 0.0 && y != 1.0) {
        return Err(MlError::InvalidInput(format!(
            "{} labels must be 0 or 1, found {}",
            what, bad
        )));
    }
    Ok(())
}

impl GradientBoostedClassifier {
    /// `config.n_estimators` 라운드로 모델을 학습합니다.
    pub fn fit(config: BoosterConfig, train: &FeatureMatrix, labels: &[f64]) -> MlResult<Self> {
        if train.is_empty() {
            return Err(MlError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        check_labels(labels, train.n_rows, "training set")?;
        if config.n_estimators == 0 {
            return Err(MlError::Training("n_estimators must be at least 1".into()));
        }
        // 단일 클래스면 초기 log-odds가 발산합니다.
        let positives = labels.iter().filter(|&&y| y == 1.0).count();
        if positives == 0 || positives == labels.len() {
            return Err(MlError::InvalidInput(format!(
                "training set contains a single class ({} of {} rows are positive)",
                positives,
                labels.len()
            )));
        }

        let mut data: DataVec = train
            .rows()
            .zip(labels)
            .map(|(row, &y)| {
                let label: ValueType = if y == 1.0 { 1.0 } else { -1.0 };
                Data::new_training_data(encode_row(row), 1.0, label, None)
            })
            .collect();

        debug!(
            rows = train.n_rows,
            features = train.n_features,
            rounds = config.n_estimators,
            "Fitting gbdt model"
        );

        let mut model = GBDT::new(&config.to_gbdt(train.n_features));
        model.fit(&mut data);

        Ok(Self {
            n_features: train.n_features,
            config,
            model,
        })
    }

    /// 측정 지점마다 모델을 학습해 곡선을 기록하고, 마지막(전체 라운드) 모델을 반환합니다.
    pub fn fit_with_history(
        config: BoosterConfig,
        train: &FeatureMatrix,
        labels: &[f64],
        eval: &FeatureMatrix,
        eval_labels: &[f64],
    ) -> MlResult<(Self, TrainingHistory)> {
        check_labels(eval_labels, eval.n_rows, "evaluation set")?;
        if eval.n_features != train.n_features {
            return Err(MlError::InvalidInput(format!(
                "evaluation set has {} features, expected {}",
                eval.n_features, train.n_features
            )));
        }

        let mut history = TrainingHistory::default();
        let mut last = None;
        for rounds in checkpoints(config.n_estimators, config.curve_points) {
            let model = Self::fit(config.clone().with_estimators(rounds), train, labels)?;
            let train_p = model.predict_proba_matrix(train);
            let eval_p = model.predict_proba_matrix(eval);
            history.record(rounds, (labels, &train_p), (eval_labels, &eval_p));
            last = Some(model);
        }

        let model = last.ok_or_else(|| MlError::Training("no boosting rounds were run".into()))?;
        Ok((model, history))
    }

    pub fn rounds(&self) -> usize {
        self.config.n_estimators
    }

    /// 한 행의 불량 확률.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let data: DataVec = vec![Data::new_test_data(encode_row(row), None)];
        self.predict_data(&data).into_iter().next().unwrap_or(0.0)
    }

    /// 행렬 전체의 불량 확률.
    pub fn predict_proba_matrix(&self, matrix: &FeatureMatrix) -> Vec<f64> {
        if matrix.is_empty() {
            return Vec::new();
        }
        let data: DataVec = matrix
            .rows()
            .map(|row| Data::new_test_data(encode_row(row), None))
            .collect();
        self.predict_data(&data)
    }

    fn predict_data(&self, data: &DataVec) -> Vec<f64> {
        self.model
            .predict(data)
            .into_iter()
            .map(|p| sanitize(f64::from(p)).clamp(0.0, 1.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(names: &[&str], values: Vec<f64>) -> FeatureMatrix {
        FeatureMatrix::new(names.iter().map(|s| s.to_string()).collect(), values).unwrap()
    }

    /// x > 5 이면 불량.
    fn threshold_data() -> (FeatureMatrix, Vec<f64>) {
        let xs: Vec<f64> = (0..40).map(|i| (i % 10) as f64).collect();
        let ys = xs.iter().map(|&x| if x > 5.0 { 1.0 } else { 0.0 }).collect();
        (matrix(&["x"], xs), ys)
    }

    fn config() -> BoosterConfig {
        BoosterConfig::default()
            .with_estimators(20)
            .with_min_samples_leaf(1)
            .with_learning_rate(0.3)
    }

    #[test]
    fn test_checkpoints_end_at_total_rounds() {
        assert_eq!(checkpoints(100, 10), vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert_eq!(checkpoints(3, 10), vec![1, 2, 3]);
        assert_eq!(checkpoints(7, 3), vec![3, 5, 7]);
        assert_eq!(checkpoints(5, 1), vec![5]);
    }

    #[test]
    fn test_fit_separates_threshold() {
        let (x, y) = threshold_data();
        let model = GradientBoostedClassifier::fit(config(), &x, &y).unwrap();
        assert!(model.predict_proba(&[8.0]) > 0.5);
        assert!(model.predict_proba(&[2.0]) < 0.5);
        assert_eq!(model.rounds(), 20);

        let probs = model.predict_proba_matrix(&x);
        assert_eq!(probs.len(), 40);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_constant_feature_with_missing_values_can_split() {
        // 관측/결측 여부만으로 라벨이 갈린다
        let xs: Vec<f64> = (0..30).map(|i| if i % 3 == 0 { 5.0 } else { f64::NAN }).collect();
        let ys: Vec<f64> = xs.iter().map(|x| if x.is_nan() { 0.0 } else { 1.0 }).collect();
        let model = GradientBoostedClassifier::fit(config(), &matrix(&["x"], xs), &ys).unwrap();

        assert!(model.predict_proba(&[5.0]) > 0.5);
        assert!(model.predict_proba(&[f64::NAN]) < 0.5);
    }

    #[test]
    fn test_history_has_one_entry_per_checkpoint() {
        let (x, y) = threshold_data();
        let (model, history) =
            GradientBoostedClassifier::fit_with_history(config().with_curve_points(4), &x, &y, &x, &y)
                .unwrap();
        assert_eq!(history.rounds, vec![5, 10, 15, 20]);
        assert_eq!(history.train_loss.len(), 4);
        assert_eq!(history.eval_accuracy.len(), 4);
        assert_eq!(model.rounds(), 20);
        assert!(history.train_loss[3] <= history.train_loss[0]);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let (x, y) = threshold_data();
        assert!(matches!(
            GradientBoostedClassifier::fit(config(), &x, &y[..3]),
            Err(MlError::InvalidInput(_))
        ));
        assert!(matches!(
            GradientBoostedClassifier::fit(config().with_estimators(0), &x, &y),
            Err(MlError::Training(_))
        ));
        assert!(matches!(
            GradientBoostedClassifier::fit(config(), &x, &vec![1.0; 40]),
            Err(MlError::InvalidInput(_))
        ));

        let empty = matrix(&["x"], vec![]);
        assert!(matches!(
            GradientBoostedClassifier::fit(config(), &empty, &[]),
            Err(MlError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let (x, y) = threshold_data();
        let model = GradientBoostedClassifier::fit(config(), &x, &y).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: GradientBoostedClassifier = serde_json::from_str(&json).unwrap();
        for v in [0.0, 5.0, 6.0, 9.0, f64::NAN] {
            assert!((model.predict_proba(&[v]) - restored.predict_proba(&[v])).abs() < 1e-6);
        }
    }
}
