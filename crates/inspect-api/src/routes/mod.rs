//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/upload` - CSV 업로드 및 현재 데이터셋 요약
//! - `/api/date-range` - 날짜 경계, 구간 검증/제출
//! - `/api/train-model` - 모델 학습 및 최근 보고서
//! - `/api/simulation/stream` - 예측 시뮬레이션 (SSE)

pub mod date_range;
pub mod health;
pub mod simulation;
pub mod training;
pub mod upload;

pub use date_range::{
    date_range_router, DateConstraints, DateRangesResponse, MessageResponse, ValidationResponse,
};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use simulation::{
    simulation_router, ErrorEvent, PredictionEvent, SimulationSummary, StreamQuery,
};
pub use training::{training_router, TrainModelRequest};
pub use upload::{upload_router, UploadResponse};

use axum::Router;
use inspect_core::ServerConfig;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 모든 서브 라우터를 조합하여 하나의 라우터로 반환합니다.
pub fn create_api_router(server: &ServerConfig) -> Router<Arc<AppState>> {
    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // 워크플로 엔드포인트
        .nest("/api/upload", upload_router(server.max_upload_bytes()))
        .nest("/api/date-range", date_range_router())
        .nest("/api/train-model", training_router())
        .nest("/api/simulation", simulation_router())
}
