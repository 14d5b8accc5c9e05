//! 실시간 예측 시뮬레이션 (Server-Sent Events).
//!
//! 시뮬레이션 구간의 행을 파일 순서대로 하나씩 예측해 `data:` 이벤트로 보내고,
//! 마지막에 `event: complete` 요약을 보냅니다.
//!
//! 예측은 별도 태스크에서 수행되며 mpsc 채널로 응답 스트림에 전달됩니다.
//! 클라이언트가 연결을 끊거나(채널 전송 실패) 서버가 종료되면 태스크가 멈춥니다.
//!
//! 행 수 제한과 `SAMP-<n>` 번호는 예측에 성공한 행만 셉니다. 실패한 행은
//! 에러 이벤트만 보내고 건너뜁니다.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use inspect_core::{format_timestamp, DateRange};
use inspect_ml::metrics::{round_to, sanitize};
use inspect_ml::{FeatureAligner, Predictor, Verdict};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::metrics::{
    decrement_active_streams, increment_active_streams, record_simulation_prediction,
};
use crate::state::{AppState, LoadedDataset};
use crate::utils::sample_id;

/// 이벤트 채널 버퍼 크기.
const EVENT_BUFFER: usize = 16;

/// 스트림 쿼리 파라미터. 지정하지 않으면 `simulation` 설정을 따릅니다.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// 최대 행 수. `simulation.max_rows`보다 크면 그 값으로 제한됩니다.
    pub limit: Option<usize>,
    /// 이벤트 간격 (밀리초)
    pub interval_ms: Option<u64>,
}

/// 행 예측 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictionEvent {
    /// 행 타임스탬프 (`YYYY-MM-DD HH:MM:SS`)
    pub time: String,
    /// 행 `Id` 또는 `SAMP-<n>`
    pub sample_id: String,
    pub prediction: Verdict,
    /// 불량 확률 (소수 넷째 자리)
    pub confidence: f64,
}

/// 에러 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorEvent {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// 스트림 종료 요약 (`event: complete`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    /// 예측에 성공한 행 수
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    /// 예측에 실패한 행 수
    pub errors: usize,
    pub avg_confidence: f64,
}

impl SimulationSummary {
    fn record(&mut self, event: &PredictionEvent) {
        self.total += 1;
        match event.prediction {
            Verdict::Pass => self.pass += 1,
            Verdict::Fail => self.fail += 1,
        }
        // 합계를 누적하고 finish()에서 평균으로 바꿉니다.
        self.avg_confidence += event.confidence;
    }

    fn finish(mut self) -> Self {
        self.avg_confidence = if self.total == 0 {
            0.0
        } else {
            sanitize(round_to(self.avg_confidence / self.total as f64, 4))
        };
        self
    }
}

/// 스트림 시작에 필요한 모든 입력.
struct SimulationPlan {
    range: DateRange,
    dataset: Arc<LoadedDataset>,
    model: Arc<dyn Predictor>,
    limit: usize,
    interval: Duration,
}

/// 활성 스트림 게이지. 드롭 시 감소합니다.
struct ActiveStream;

impl ActiveStream {
    fn open() -> Self {
        increment_active_streams();
        ActiveStream
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        decrement_active_streams();
    }
}

fn json_event<T: Serialize>(payload: &T) -> Event {
    Event::default()
        .json_data(payload)
        .unwrap_or_else(|_| Event::default().data(r#"{"error":"Event serialization failed"}"#))
}

fn error_event(message: impl Into<String>, detail: Option<String>) -> Event {
    json_event(&ErrorEvent {
        error: message.into(),
        detail,
    })
}

/// 요청 limit은 `max_rows`를 낮출 수만 있습니다.
fn effective_limit(requested: Option<usize>, max_rows: usize) -> usize {
    requested.map_or(max_rows, |limit| limit.min(max_rows))
}

/// 선행 조건을 확인합니다. 실패 시 클라이언트에 보낼 메시지를 반환합니다.
async fn prepare(state: &AppState, query: &StreamQuery) -> Result<SimulationPlan, &'static str> {
    let ranges = state
        .current_ranges()
        .await
        .ok_or("Simulation range not available")?;
    let dataset = state.current_dataset().await.ok_or("Dataset not uploaded")?;
    let model = state.current_model().await.ok_or("Model not trained")?;
    debug!(model_id = %model.id, "Using latest trained model");

    let config = &state.config.simulation;
    Ok(SimulationPlan {
        range: ranges.simulation,
        dataset,
        model,
        limit: effective_limit(query.limit, config.max_rows),
        interval: Duration::from_millis(query.interval_ms.unwrap_or(config.interval_ms)),
    })
}

/// 행을 예측해 채널로 보냅니다.
async fn run_simulation(plan: SimulationPlan, tx: mpsc::Sender<Event>, shutdown: CancellationToken) {
    let _active = ActiveStream::open();
    let dataset = &plan.dataset.dataset;
    let model = &plan.model;

    let aligner = FeatureAligner::new(model.feature_names(), &dataset.schema.feature_columns);
    let missing = aligner.missing_features();
    if !missing.is_empty() {
        warn!(features = ?missing, "Dataset lacks model features, treating them as missing");
    }

    info!(
        range = %plan.range,
        limit = plan.limit,
        interval_ms = plan.interval.as_millis() as u64,
        model = model.name(),
        "Simulation stream started"
    );

    let mut summary = SimulationSummary::default();

    for row in dataset.rows_in(&plan.range) {
        if summary.total >= plan.limit {
            break;
        }
        if shutdown.is_cancelled() {
            info!("Server shutting down, stopping simulation stream");
            return;
        }

        let event = match model.predict_row(&aligner.align(&row.features)) {
            Ok(prediction) => {
                let payload = PredictionEvent {
                    time: format_timestamp(&row.timestamp),
                    sample_id: sample_id(row.id.as_deref(), summary.total + 1),
                    prediction: prediction.label,
                    confidence: prediction.confidence(),
                };
                record_simulation_prediction(payload.prediction.as_str());
                summary.record(&payload);
                debug!(sample = %payload.sample_id, prediction = %payload.prediction, "Row predicted");
                json_event(&payload)
            }
            Err(e) => {
                record_simulation_prediction("error");
                summary.errors += 1;
                warn!(timestamp = %row.timestamp, error = %e, "Row prediction failed");
                error_event("Prediction failed", Some(e.to_string()))
            }
        };

        if tx.send(event).await.is_err() {
            info!(sent = summary.total, "Client disconnected, stopping simulation stream");
            return;
        }

        if !plan.interval.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(plan.interval) => {}
                _ = shutdown.cancelled() => {
                    info!("Server shutting down, stopping simulation stream");
                    return;
                }
            }
        }
    }

    let summary = summary.finish();
    info!(
        total = summary.total,
        pass = summary.pass,
        fail = summary.fail,
        errors = summary.errors,
        "Simulation stream completed"
    );
    let _ = tx.send(json_event(&summary).event("complete")).await;
}

/// 시뮬레이션 스트림.
///
/// GET /api/simulation/stream
#[utoipa::path(
    get,
    path = "/api/simulation/stream",
    params(StreamQuery),
    responses(
        (status = 200, description = "예측 이벤트 스트림 (text/event-stream)", body = PredictionEvent, content_type = "text/event-stream")
    ),
    tag = "simulation"
)]
pub async fn stream_simulation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    match prepare(&state, &query).await {
        Ok(plan) => {
            tokio::spawn(run_simulation(plan, tx, state.shutdown.clone()));
        }
        Err(message) => {
            warn!(reason = message, "Simulation preconditions not met");
            // 버퍼가 비어 있으므로 즉시 성공합니다.
            let _ = tx.try_send(error_event(message, None));
        }
    }

    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<_, Infallible>(event), rx))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// 시뮬레이션 라우터 생성.
pub fn simulation_router() -> Router<Arc<AppState>> {
    Router::new().route("/stream", get(stream_simulation))
}
