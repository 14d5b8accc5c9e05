//! IntelliInspect API 서버.
//!
//! 설정을 로드하고, 데이터 디렉토리의 이전 상태를 복원한 뒤
//! Axum 기반 REST/SSE 서버를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use inspect_core::{init_logging, AppConfig, LogConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use inspect_api::metrics::setup_metrics_recorder;
use inspect_api::middleware::metrics_layer;
use inspect_api::openapi::swagger_ui_router;
use inspect_api::routes::create_api_router;
use inspect_api::state::AppState;

/// CORS 레이어 생성.
///
/// `server.cors_origins`가 비어 있으면 모든 origin을 허용합니다 (개발 모드).
fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let restricted = !parsed.is_empty();
    let allow_origin = if restricted {
        info!("CORS configured with {} allowed origins", parsed.len());
        AllowOrigin::list(parsed)
    } else {
        if !origins.is_empty() {
            warn!("server.cors_origins contains no valid origins, allowing any");
        } else {
            warn!("server.cors_origins not set, allowing any origin (development mode)");
        }
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::CACHE_CONTROL,
        ])
        // 자격 증명 포함 허용 (origin 목록 설정 시에만)
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let server = state.config.server.clone();

    // 메트릭 라우터 (별도 상태)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router(&server).with_state(state))
        // OpenAPI 문서 및 Swagger UI
        .merge(swagger_ui_router())
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        // 응답 헤더까지의 타임아웃. SSE 본문 스트리밍에는 적용되지 않습니다.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.request_timeout_secs),
        ))
        .layer(cors_layer(&server.cors_origins))
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON 스펙을 stdout으로 출력하고 종료합니다.
fn handle_export_openapi() -> Result<(), Box<dyn std::error::Error>> {
    use inspect_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;
        println!("{}", json);
        std::process::exit(0);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    handle_export_openapi()?;

    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from(&config.logging))?;

    info!("Starting IntelliInspect API server...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = config.bind_address().parse().map_err(|e| {
        error!(
            host = %config.server.host,
            port = config.server.port,
            error = %e,
            "Invalid bind address. Check server.host / INSPECT_SERVER__HOST"
        );
        e
    })?;

    // 데이터 디렉토리 파일 읽기는 blocking 작업
    let state = tokio::task::spawn_blocking(move || AppState::restore(config)).await??;
    let state = Arc::new(state);

    info!(
        version = %state.version,
        data_dir = %state.store.root().display(),
        has_dataset = state.current_dataset().await.is_some(),
        has_ranges = state.current_ranges().await.is_some(),
        has_model = state.current_model().await.is_some(),
        "Application state initialized"
    );

    let shutdown_token = state.shutdown.clone();
    let app = create_router(state, metrics_handle);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    // 시그널 외의 경로로 종료된 경우에도 스트림 태스크를 멈춥니다.
    shutdown_token.cancel();
    info!("Server stopped gracefully");

    Ok(())
}

/// Ctrl+C 또는 SIGTERM을 기다린 뒤 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    // 진행 중인 시뮬레이션 스트림에 종료 시그널 전파
    shutdown_token.cancel();
    info!("Shutdown signal propagated to simulation streams");
}
