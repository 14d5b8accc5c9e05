//! 날짜 구간 endpoint.
//!
//! 데이터셋 경계 조회, 학습/테스트/시뮬레이션 구간 검증과 월별 차트 데이터,
//! 구간 제출을 제공합니다.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use inspect_core::{
    format_timestamp, monthly_volumes, validate_ranges, DateRangeRequest, MonthlyVolume, RangeSet,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{api_error, core_error, validation_error, ApiError, ApiResult};
use crate::state::AppState;

/// 데이터셋이 없을 때 반환하는 경계 값.
const DEFAULT_CONSTRAINT: &str = "2020-12-31";

/// 선택 가능한 날짜 경계.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateConstraints {
    /// 가장 이른 타임스탬프 (`YYYY-MM-DD HH:MM:SS`)
    pub min_date: String,
    /// 가장 늦은 타임스탬프
    pub max_date: String,
}

/// 구간 검증 결과.
///
/// `status`가 "invalid"이면 `errors`, "valid"이면 `chartData`가 채워집니다.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    /// "valid" | "invalid"
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<Vec<MonthlyVolume>>,
}

/// 단순 메시지 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// 저장된 구간 (`YYYY-MM-DD`).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateRangesResponse {
    pub train_start: String,
    pub train_end: String,
    pub test_start: String,
    pub test_end: String,
    pub sim_start: String,
    pub sim_end: String,
    pub train_days: i64,
    pub test_days: i64,
    pub sim_days: i64,
}

impl From<RangeSet> for DateRangesResponse {
    fn from(r: RangeSet) -> Self {
        Self {
            train_start: r.train.start.to_string(),
            train_end: r.train.end.to_string(),
            test_start: r.test.start.to_string(),
            test_end: r.test.end.to_string(),
            sim_start: r.simulation.start.to_string(),
            sim_end: r.simulation.end.to_string(),
            train_days: r.train.days(),
            test_days: r.test.days(),
            sim_days: r.simulation.days(),
        }
    }
}

/// 요청 본문을 검증하고 세 구간으로 파싱합니다.
fn parse_request(request: &DateRangeRequest) -> Result<RangeSet, ApiError> {
    request.validate().map_err(|e| validation_error(&e))?;
    request
        .to_range_set()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "INVALID_DATE", e.to_string()))
}

/// 데이터셋 날짜 경계 조회.
///
/// GET /api/date-range/constraints
#[utoipa::path(
    get,
    path = "/api/date-range/constraints",
    responses((status = 200, description = "날짜 경계", body = DateConstraints)),
    tag = "date-range"
)]
pub async fn get_constraints(State(state): State<Arc<AppState>>) -> Json<DateConstraints> {
    let bounds = state
        .current_dataset()
        .await
        .and_then(|loaded| loaded.dataset.bounds());

    let constraints = match bounds {
        Some((min, max)) => DateConstraints {
            min_date: format_timestamp(&min),
            max_date: format_timestamp(&max),
        },
        None => {
            warn!("No dataset loaded, returning default date constraints");
            DateConstraints {
                min_date: DEFAULT_CONSTRAINT.to_string(),
                max_date: DEFAULT_CONSTRAINT.to_string(),
            }
        }
    };

    Json(constraints)
}

/// 구간 검증 및 월별 차트 데이터 계산.
///
/// POST /api/date-range/validate
#[utoipa::path(
    post,
    path = "/api/date-range/validate",
    request_body = DateRangeRequest,
    responses(
        (status = 200, description = "검증 결과", body = ValidationResponse),
        (status = 400, description = "데이터셋 없음 또는 잘못된 날짜", body = crate::error::ApiErrorResponse)
    ),
    tag = "date-range"
)]
pub async fn validate_date_ranges(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DateRangeRequest>,
) -> ApiResult<Json<ValidationResponse>> {
    let loaded = state.current_dataset().await.ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "NO_DATASET", "No dataset uploaded.")
    })?;
    let ranges = parse_request(&request)?;

    let (min, max) = loaded.dataset.bounds().ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "NO_DATASET", "Dataset contains no rows.")
    })?;

    let errors = validate_ranges(&ranges, (min.date(), max.date()));
    if !errors.is_empty() {
        warn!(errors = ?errors, "Date range validation failed");
        return Ok(Json(ValidationResponse {
            status: "invalid".to_string(),
            message: "Date ranges are invalid.".to_string(),
            errors,
            chart_data: None,
        }));
    }

    let chart_data = monthly_volumes(&loaded.dataset, &ranges);
    info!(months = chart_data.len(), "Date ranges validated");

    Ok(Json(ValidationResponse {
        status: "valid".to_string(),
        message: "Date ranges validated successfully.".to_string(),
        errors: Vec::new(),
        chart_data: Some(chart_data),
    }))
}

/// 구간 제출 및 저장.
///
/// POST /api/date-range/submit
#[utoipa::path(
    post,
    path = "/api/date-range/submit",
    request_body = DateRangeRequest,
    responses(
        (status = 200, description = "저장 완료", body = MessageResponse),
        (status = 400, description = "잘못된 날짜", body = crate::error::ApiErrorResponse)
    ),
    tag = "date-range"
)]
pub async fn submit_date_ranges(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DateRangeRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let ranges = parse_request(&request)?;

    state.commit_ranges(ranges).await.map_err(|e| core_error(&e))?;

    info!(
        train = %ranges.train,
        test = %ranges.test,
        sim = %ranges.simulation,
        "Date ranges submitted"
    );

    Ok(Json(MessageResponse {
        message: "Date ranges submitted successfully.".to_string(),
    }))
}

/// 저장된 구간 조회.
///
/// GET /api/date-range
#[utoipa::path(
    get,
    path = "/api/date-range",
    responses(
        (status = 200, description = "저장된 구간", body = DateRangesResponse),
        (status = 404, description = "제출된 구간 없음", body = crate::error::ApiErrorResponse)
    ),
    tag = "date-range"
)]
pub async fn get_date_ranges(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<DateRangesResponse>> {
    state
        .current_ranges()
        .await
        .map(|r| Json(r.into()))
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "NO_RANGES",
                "No date ranges have been submitted",
            )
        })
}

/// 날짜 구간 라우터 생성.
pub fn date_range_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_date_ranges))
        .route("/constraints", get(get_constraints))
        .route("/validate", post(validate_date_ranges))
        .route("/submit", post(submit_date_ranges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{create_test_state, LoadedDataset};
    use axum::{body::Body, http::Request};
    use inspect_core::Dataset;
    use tower::ServiceExt;

    const CSV: &str = "Id,Timestamp,Temp,Response\n\
        A1,2021-01-01 08:00:00,10,0\n\
        A2,2021-01-20 08:00:00,90,1\n\
        A3,2021-02-03 08:00:00,15,0\n\
        A4,2021-02-25 17:30:00,85,1\n";

    fn body(train: (&str, &str), test: (&str, &str), sim: (&str, &str)) -> String {
        serde_json::json!({
            "trainStart": train.0, "trainEnd": train.1,
            "testStart": test.0, "testEnd": test.1,
            "simStart": sim.0, "simEnd": sim.1,
        })
        .to_string()
    }

    async fn app_with_dataset() -> (Router, std::path::PathBuf) {
        let state = create_test_state();
        let root = state.store.root().to_path_buf();
        state
            .commit_upload(
                CSV.as_bytes().to_vec(),
                LoadedDataset {
                    file_name: "line.csv".to_string(),
                    dataset: Dataset::from_bytes(CSV.as_bytes()).unwrap(),
                },
            )
            .await
            .unwrap();
        let app = Router::new()
            .nest("/api/date-range", date_range_router())
            .with_state(Arc::new(state));
        (app, root)
    }

    async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_constraints_default_without_dataset() {
        let state = Arc::new(create_test_state());
        let app = Router::new()
            .nest("/api/date-range", date_range_router())
            .with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/date-range/constraints")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let constraints: DateConstraints = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(constraints.min_date, "2020-12-31");
        assert_eq!(constraints.max_date, "2020-12-31");
    }

    #[tokio::test]
    async fn test_validate_returns_chart_data() {
        let (app, root) = app_with_dataset().await;
        let (status, json) = post_json(
            app,
            "/api/date-range/validate",
            body(
                ("2021-01-01", "2021-01-31"),
                ("2021-02-01", "2021-02-10"),
                ("2021-02-11", "2021-02-25"),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "valid");
        let chart = json["chartData"].as_array().unwrap();
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0]["month"], "Jan");
        assert_eq!(chart[0]["trainVolume"], 2);
        assert_eq!(chart[1]["testVolume"], 1);
        assert_eq!(chart[1]["simVolume"], 1);

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_submit_persists_and_serves_ranges() {
        let (app, root) = app_with_dataset().await;
        let (status, json) = post_json(
            app.clone(),
            "/api/date-range/submit",
            body(
                ("2021-01-01", "2021-01-31"),
                ("2021-02-01", "2021-02-10"),
                ("2021-02-11", "2021-02-25"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Date ranges submitted successfully.");
        assert!(root.join(inspect_core::RANGES_FILE).exists());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/date-range")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_validate_reports_out_of_bounds() {
        let (app, root) = app_with_dataset().await;
        let (status, json) = post_json(
            app,
            "/api/date-range/validate",
            body(
                ("2020-12-01", "2021-01-31"),
                ("2021-02-10", "2021-02-01"),
                ("2021-02-11", "2021-02-25"),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "invalid");
        let errors: Vec<String> = serde_json::from_value(json["errors"].clone()).unwrap();
        assert_eq!(
            errors,
            vec![
                "Train range is outside dataset boundaries.",
                "Test start date must be before end date.",
            ]
        );
        assert!(json.get("chartData").is_none());

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_validate_rejects_unparsable_date() {
        let (app, root) = app_with_dataset().await;
        let (status, json) = post_json(
            app,
            "/api/date-range/validate",
            body(
                ("yesterday", "2021-01-31"),
                ("2021-02-01", "2021-02-10"),
                ("2021-02-11", "2021-02-25"),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_DATE");

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_validate_without_dataset() {
        let state = Arc::new(create_test_state());
        let app = Router::new()
            .nest("/api/date-range", date_range_router())
            .with_state(state);

        let (status, json) = post_json(
            app,
            "/api/date-range/validate",
            body(
                ("2021-01-01", "2021-01-31"),
                ("2021-02-01", "2021-02-10"),
                ("2021-02-11", "2021-02-25"),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "NO_DATASET");
    }
}
