//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 업로드/학습/시뮬레이션 메트릭을 수집하고
//! `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 레코더를 전역으로 설치하고 렌더링 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("model_training_duration_seconds".to_string()),
            &[0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 비즈니스 메트릭
// ============================================================================

/// 업로드 성공 기록 및 현재 데이터셋 행 수 갱신.
pub fn record_dataset_upload(rows: usize) {
    counter!("dataset_uploads_total").increment(1);
    gauge!("dataset_rows").set(rows as f64);
}

/// 학습 결과 기록 (`status`: "success" | "failed").
pub fn record_training(status: &str, duration_secs: f64) {
    counter!("model_training_total", "status" => status.to_string()).increment(1);
    histogram!("model_training_duration_seconds").record(duration_secs);
}

/// 시뮬레이션 예측 카운터 증가 (`prediction`: "Pass" | "Fail" | "error").
pub fn record_simulation_prediction(prediction: &str) {
    counter!("simulation_predictions_total", "prediction" => prediction.to_string()).increment(1);
}

pub fn increment_active_streams() {
    gauge!("simulation_streams_active").increment(1.0);
}

pub fn decrement_active_streams() {
    gauge!("simulation_streams_active").decrement(1.0);
}

// ============================================================================
// 경로 정규화
// ============================================================================

/// 경로의 동적 세그먼트(UUID, 숫자)를 `:id`로 바꿔 라벨 카디널리티를 제한합니다.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
            if is_uuid || is_numeric {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/models/123e4567-e89b-12d3-a456-426614174000"),
            "/api/models/:id"
        );
        assert_eq!(normalize_path("/api/upload/42"), "/api/upload/:id");
        assert_eq!(
            normalize_path("/api/simulation/stream"),
            "/api/simulation/stream"
        );
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_dataset_upload(10);
        record_training("success", 1.5);
        record_simulation_prediction("Pass");
        increment_active_streams();
        decrement_active_streams();
    }
}
