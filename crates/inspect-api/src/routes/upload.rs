//! 데이터셋 업로드 endpoint.
//!
//! multipart `file` 필드로 받은 CSV를 파싱해 메모리 데이터셋을 교체하고
//! 원본을 데이터 디렉토리에 저장합니다.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use inspect_core::{Dataset, DatasetSummary};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::{api_error, core_error, ApiResult};
use crate::metrics::record_dataset_upload;
use crate::state::{AppState, LoadedDataset};

/// multipart 파일 필드 이름.
const FILE_FIELD: &str = "file";

/// 업로드 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
    #[serde(flatten)]
    pub summary: DatasetSummary,
}

/// CSV 업로드.
///
/// POST /api/upload
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "`file` 필드에 CSV"),
    responses(
        (status = 200, description = "업로드 성공", body = UploadResponse),
        (status = 400, description = "빈 파일 또는 CSV 파싱 실패", body = crate::error::ApiErrorResponse),
        (status = 413, description = "업로드 크기 초과")
    ),
    tag = "upload"
)]
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Malformed multipart body");
        api_error(e.status(), "INVALID_MULTIPART", e.body_text())
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or(FILE_FIELD).to_string();
        let bytes = field.bytes().await.map_err(|e| {
            warn!(error = %e, "Failed to read uploaded file");
            api_error(e.status(), "INVALID_MULTIPART", e.body_text())
        })?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }

    let (file_name, bytes) = match upload {
        Some((name, bytes)) if !bytes.is_empty() => (name, bytes),
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "EMPTY_FILE",
                "No file was uploaded or the file is empty",
            ))
        }
    };

    let size = bytes.len();
    let (bytes, parsed) = tokio::task::spawn_blocking(move || {
        let parsed = Dataset::from_bytes(&bytes);
        (bytes, parsed)
    })
    .await
    .map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            format!("upload task failed: {}", e),
        )
    })?;

    let dataset = parsed.map_err(|e| {
        warn!(file = %file_name, error = %e, "Rejected CSV upload");
        api_error(StatusCode::BAD_REQUEST, "INVALID_CSV", e.to_string())
    })?;

    let summary = dataset.summary();
    let fingerprint = dataset.fingerprint.clone();

    // 파싱이 성공한 경우에만 원본을 저장
    state
        .commit_upload(
            bytes,
            LoadedDataset {
                file_name: file_name.clone(),
                dataset,
            },
        )
        .await
        .map_err(|e| core_error(&e))?;

    info!(
        file = %file_name,
        bytes = size,
        rows = summary.total_rows,
        skipped = summary.skipped_rows,
        features = summary.feature_count,
        fingerprint = %fingerprint,
        "Dataset uploaded"
    );
    record_dataset_upload(summary.total_rows);

    Ok(Json(UploadResponse { file_name, summary }))
}

/// 현재 데이터셋 요약.
///
/// GET /api/upload
#[utoipa::path(
    get,
    path = "/api/upload",
    responses(
        (status = 200, description = "현재 데이터셋", body = UploadResponse),
        (status = 404, description = "업로드된 데이터셋 없음", body = crate::error::ApiErrorResponse)
    ),
    tag = "upload"
)]
pub async fn current_dataset(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<UploadResponse>> {
    let loaded = state.current_dataset().await.ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            "NO_DATASET",
            "No dataset has been uploaded",
        )
    })?;

    Ok(Json(UploadResponse {
        file_name: loaded.file_name.clone(),
        summary: loaded.dataset.summary(),
    }))
}

/// 업로드 라우터 생성.
///
/// 요청 본문 크기 제한은 `server.max_upload_mb` 설정을 따릅니다.
pub fn upload_router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(upload_dataset).get(current_dataset))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
