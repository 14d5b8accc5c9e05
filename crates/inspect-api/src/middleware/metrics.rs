//! HTTP 요청 메트릭 미들웨어.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
};

/// 요청마다 다음을 기록합니다:
/// - `http_requests_total` (method, path)
/// - `http_responses_total` (method, path, status)
/// - `http_request_duration_seconds`
///
/// SSE 응답의 지속 시간은 헤더 전송까지만 측정됩니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    record_http_request(&method, &path);

    let response = next.run(request).await;

    record_http_response(&method, &path, response.status().as_u16());
    record_http_duration(&method, &path, start.elapsed().as_secs_f64());

    response
}
