//! # Inspect ML
//!
//! 검사 데이터셋 불량 예측 모델.
//!
//! ```text
//! Dataset ──(train/test DateRange)──▶ FeatureMatrix
//!                                        │
//!                                        ▼
//!                           GradientBoostedClassifier (gbdt crate)
//!                                        │
//!                     TrainingReport ◀───┴───▶ Predictor (Pass/Fail)
//! ```
//!
//! # 예제
//!
//! ```ignore
//! use inspect_ml::{BoosterConfig, Trainer, TrainingRequest, Predictor};
//!
//! let model = Trainer::new(BoosterConfig::default()).train(&dataset, &request)?;
//! println!("accuracy: {}%", model.report.accuracy);
//! let verdict = model.predict_row(&features)?;
//! ```

pub mod booster;
pub mod error;
pub mod features;
pub mod metrics;
pub mod predictor;
pub mod trainer;

pub use error::{MlError, MlResult};
pub use features::{labels, FeatureAligner, FeatureMatrix};
pub use booster::{BoosterConfig, GradientBoostedClassifier, TrainingHistory};
pub use metrics::{ClassificationMetrics, ConfusionMatrix};
pub use predictor::{Predictor, RowPrediction, Verdict};
pub use trainer::{TrainedModel, Trainer, TrainingReport, TrainingRequest, MODEL_FILE};
