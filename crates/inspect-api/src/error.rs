//! API 에러 응답 타입.
//!
//! 모든 엔드포인트는 실패 시 `(StatusCode, Json<ApiErrorResponse>)`를 반환합니다.

use axum::http::StatusCode;
use axum::Json;
use inspect_core::CoreError;
use inspect_ml::MlError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "NO_DATASET",
///   "message": "No dataset has been uploaded",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_CSV", "NO_MODEL")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 상세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 핸들러 에러 타입.
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 상태 코드와 에러 코드로 에러 응답을 만듭니다.
pub fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(ApiErrorResponse::new(code, message)))
}

/// `validator` 에러를 400 `VALIDATION_ERROR`로 변환합니다.
pub fn validation_error(errors: &ValidationErrors) -> ApiError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ");
    api_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
}

/// 핵심 크레이트 에러를 HTTP 에러로 변환합니다.
pub fn core_error(err: &CoreError) -> ApiError {
    match err {
        CoreError::NotFound(msg) => api_error(StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        e if e.is_client_error() => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_INPUT", e.to_string())
        }
        e => api_error(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string()),
    }
}

/// ML 에러를 HTTP 에러로 변환합니다.
pub fn ml_error(err: &MlError) -> ApiError {
    match err {
        MlError::InsufficientData { required, actual } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiErrorResponse::with_details(
                "INSUFFICIENT_DATA",
                "Selected ranges contain no labeled rows",
                serde_json::json!({ "required": required, "actual": actual }),
            )),
        ),
        MlError::InvalidInput(msg) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
        }
        MlError::NotTrained => api_error(StatusCode::NOT_FOUND, "NO_MODEL", err.to_string()),
        MlError::Training(msg) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "TRAINING_FAILED",
            msg.clone(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("NO_DATASET", "No dataset");
        assert_eq!(error.code, "NO_DATASET");
        assert!(error.timestamp.is_some());
        assert!(error.details.is_none());

        let json = serde_json::to_string(&error).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains(r#""code":"NO_DATASET""#));
    }

    #[test]
    fn test_ml_error_mapping() {
        let (status, Json(body)) = ml_error(&MlError::InsufficientData {
            required: 1,
            actual: 0,
        });
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.code, "INSUFFICIENT_DATA");
        assert_eq!(body.details.unwrap()["actual"], 0);

        let (status, _) = ml_error(&MlError::InvalidInput("bad".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_core_error_mapping() {
        let (status, Json(body)) = core_error(&CoreError::Csv("row 2".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_INPUT");

        let (status, _) = core_error(&CoreError::Io("disk".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
