//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use inspect_core::{DatasetSummary, DateRangeRequest, MonthlyVolume};
use inspect_ml::{ConfusionMatrix, TrainingReport, Verdict};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiErrorResponse;
use crate::routes::{
    ComponentHealth, ComponentStatus, DateConstraints, DateRangesResponse, ErrorEvent,
    HealthResponse, MessageResponse, PredictionEvent, SimulationSummary, TrainModelRequest,
    UploadResponse, ValidationResponse,
};

/// IntelliInspect API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "IntelliInspect API",
        version = "0.1.0",
        description = r#"
# IntelliInspect 검사 품질 예측 API

CSV 업로드 → 날짜 구간 검증 → 모델 학습 → 실시간 예측 시뮬레이션 워크플로를 제공합니다.

## 에러 응답

모든 에러는 `{ code, message, details?, timestamp? }` 형식입니다.

## 시뮬레이션

`GET /api/simulation/stream`은 `text/event-stream`으로 행별 예측을 보내고
마지막에 `event: complete` 요약을 보냅니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:5000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "upload", description = "업로드 - CSV 데이터셋"),
        (name = "date-range", description = "날짜 구간 - 경계 조회, 검증, 제출"),
        (name = "training", description = "학습 - 모델 학습 및 보고서"),
        (name = "simulation", description = "시뮬레이션 - 실시간 예측 스트림")
    ),
    components(
        schemas(
            // ===== Common =====
            ApiErrorResponse,

            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Upload =====
            UploadResponse,
            DatasetSummary,

            // ===== Date range =====
            DateRangeRequest,
            DateConstraints,
            ValidationResponse,
            MonthlyVolume,
            MessageResponse,
            DateRangesResponse,

            // ===== Training =====
            TrainModelRequest,
            TrainingReport,
            ConfusionMatrix,

            // ===== Simulation =====
            PredictionEvent,
            ErrorEvent,
            SimulationSummary,
            Verdict,
        )
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::health::health_ready,
        crate::routes::upload::upload_dataset,
        crate::routes::upload::current_dataset,
        crate::routes::date_range::get_constraints,
        crate::routes::date_range::validate_date_ranges,
        crate::routes::date_range::submit_date_ranges,
        crate::routes::date_range::get_date_ranges,
        crate::routes::training::train_model,
        crate::routes::training::latest_report,
        crate::routes::simulation::stream_simulation,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("IntelliInspect API"));
        assert!(json.contains("/health/ready"));
        assert!(json.contains("/api/upload"));
        assert!(json.contains("/api/date-range/validate"));
        assert!(json.contains("/api/train-model"));
        assert!(json.contains("/api/simulation/stream"));
    }

    #[test]
    fn test_openapi_contains_schemas() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();

        assert!(json.contains("TrainingReport"));
        assert!(json.contains("DateRangeRequest"));
        assert!(json.contains("PredictionEvent"));
        assert!(json.contains("ApiErrorResponse"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }
}
