//! 모델 학습 endpoint.
//!
//! 학습은 CPU 집약 작업이므로 `spawn_blocking`으로 별도 thread pool에서 실행하며,
//! 동시에 하나의 학습만 허용합니다.
//!
//! 학습 작업은 `tokio::spawn`된 task가 학습 락을 소유한 채 끝까지 진행합니다.
//! 요청 timeout이나 클라이언트 연결 종료로 핸들러가 drop되어도 락은
//! 학습과 모델 저장이 끝난 뒤에 풀립니다.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use inspect_core::{parse_date, DateRange, RangeSet};
use inspect_ml::{BoosterConfig, MlError, TrainedModel, Trainer, TrainingReport, TrainingRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::error::{api_error, core_error, ml_error, ApiError, ApiResult};
use crate::metrics::record_training;
use crate::state::{AppState, CommitError, LoadedDataset};

/// 학습 요청.
///
/// 모든 필드는 선택이며, 빠진 값은 제출된 구간으로 채웁니다.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrainModelRequest {
    pub train_start: Option<String>,
    pub train_end: Option<String>,
    pub test_start: Option<String>,
    pub test_end: Option<String>,
}

fn no_ranges() -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "NO_RANGES",
        "Training ranges were not provided and none have been submitted",
    )
}

/// 요청 값 또는 저장된 값으로 날짜 하나를 결정합니다.
fn resolve_date(
    field: &str,
    value: Option<&str>,
    fallback: Option<chrono::NaiveDate>,
) -> Result<chrono::NaiveDate, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => parse_date(raw).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_DATE",
                format!("{} is not a valid date: '{}'", field, raw),
            )
        }),
        None => fallback.ok_or_else(no_ranges),
    }
}

impl TrainModelRequest {
    /// 학습/테스트 구간을 결정합니다.
    pub fn resolve(&self, saved: Option<&RangeSet>) -> Result<TrainingRequest, ApiError> {
        let train = DateRange::new(
            resolve_date("trainStart", self.train_start.as_deref(), saved.map(|r| r.train.start))?,
            resolve_date("trainEnd", self.train_end.as_deref(), saved.map(|r| r.train.end))?,
        );
        let test = DateRange::new(
            resolve_date("testStart", self.test_start.as_deref(), saved.map(|r| r.test.start))?,
            resolve_date("testEnd", self.test_end.as_deref(), saved.map(|r| r.test.end))?,
        );
        Ok(TrainingRequest { train, test })
    }
}

/// 모델 학습.
///
/// POST /api/train-model
#[utoipa::path(
    post,
    path = "/api/train-model",
    request_body = TrainModelRequest,
    responses(
        (status = 200, description = "학습 완료", body = TrainingReport),
        (status = 400, description = "데이터셋/구간 없음 또는 잘못된 날짜", body = crate::error::ApiErrorResponse),
        (status = 409, description = "다른 학습 진행 중", body = crate::error::ApiErrorResponse),
        (status = 422, description = "구간에 라벨이 있는 행이 없음", body = crate::error::ApiErrorResponse)
    ),
    tag = "training"
)]
pub async fn train_model(
    State(state): State<Arc<AppState>>,
    request: Option<Json<TrainModelRequest>>,
) -> ApiResult<Json<TrainingReport>> {
    let guard = state.training.clone().try_lock_owned().map_err(|_| {
        api_error(
            StatusCode::CONFLICT,
            "TRAINING_IN_PROGRESS",
            "Another training run is in progress",
        )
    })?;

    let loaded = state.current_dataset().await.ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "NO_DATASET", "No dataset uploaded.")
    })?;

    let request = request.map(|Json(r)| r).unwrap_or_default();
    let saved = state.current_ranges().await;
    let ranges = request.resolve(saved.as_ref())?;

    let job = TrainingJob {
        state: state.clone(),
        dataset: loaded,
        ranges,
        _guard: guard,
    };
    let model = tokio::spawn(job.run()).await.map_err(|e| {
        error!(error = %e, "Training job panicked");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "TRAINING_FAILED",
            format!("training job failed: {}", e),
        )
    })??;

    Ok(Json(model.report.clone()))
}

/// 학습 락을 소유한 학습 작업.
struct TrainingJob {
    state: Arc<AppState>,
    dataset: Arc<LoadedDataset>,
    ranges: TrainingRequest,
    _guard: OwnedMutexGuard<()>,
}

impl TrainingJob {
    /// 학습 후 모델을 저장합니다. 락은 작업이 끝날 때 풀립니다.
    async fn run(self) -> Result<Arc<TrainedModel>, ApiError> {
        let trainer = Trainer::new(BoosterConfig::from(&self.state.config.training));
        let started = Instant::now();
        let ranges = self.ranges;
        let dataset = self.dataset.clone();

        let result = tokio::task::spawn_blocking(move || trainer.train(&dataset.dataset, &ranges))
            .await
            .map_err(|e| {
                error!(error = %e, "Training task panicked");
                record_training("failed", started.elapsed().as_secs_f64());
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "TRAINING_FAILED",
                    format!("training task failed: {}", e),
                )
            })?;

        let model = match result {
            Ok(model) => model,
            Err(e) => {
                record_training("failed", started.elapsed().as_secs_f64());
                warn!(error = %e, train = %ranges.train, test = %ranges.test, "Training rejected");
                return Err(ml_error(&e));
            }
        };

        // 학습 중 데이터셋이 교체되었다면 결과를 버립니다.
        let model = match self.state.commit_model(model, &self.dataset).await {
            Ok(model) => model,
            Err(CommitError::DatasetChanged) => {
                record_training("failed", started.elapsed().as_secs_f64());
                warn!("Discarding model trained on a replaced dataset");
                return Err(api_error(
                    StatusCode::CONFLICT,
                    "DATASET_CHANGED",
                    "Dataset was replaced while training; retrain on the new dataset",
                ));
            }
            Err(CommitError::Storage(e)) => {
                record_training("failed", started.elapsed().as_secs_f64());
                return Err(core_error(&e));
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        record_training("success", elapsed);
        info!(
            model_id = %model.id,
            accuracy = model.report.accuracy,
            rounds = model.report.rounds,
            elapsed_secs = elapsed,
            "Model trained and persisted"
        );
        Ok(model)
    }
}

/// 최근 학습 결과.
///
/// GET /api/train-model
#[utoipa::path(
    get,
    path = "/api/train-model",
    responses(
        (status = 200, description = "최근 학습 보고서", body = TrainingReport),
        (status = 404, description = "학습된 모델 없음", body = crate::error::ApiErrorResponse)
    ),
    tag = "training"
)]
pub async fn latest_report(State(state): State<Arc<AppState>>) -> ApiResult<Json<TrainingReport>> {
    state
        .current_model()
        .await
        .map(|model| Json(model.report.clone()))
        .ok_or_else(|| ml_error(&MlError::NotTrained))
}

/// 학습 라우터 생성.
pub fn training_router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(train_model).get(latest_report))
}
