//! 설정 관리.
//!
//! 기본값 → 설정 파일(선택) → `INSPECT__` 접두사 환경 변수 순서로
//! 덮어씁니다. 예: `INSPECT__SERVER__PORT=8080`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 모델 학습 설정
    #[serde(default)]
    pub training: TrainingConfig,
    /// 시뮬레이션 스트림 설정
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 업로드 최대 크기 (MB)
    pub max_upload_mb: usize,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 허용 CORS origin 목록 (비어 있으면 모두 허용)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_mb: 2048,
            request_timeout_secs: 300,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// 업로드 최대 크기 (bytes).
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// 저장소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 업로드 파일과 모델을 보관할 디렉토리
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("UploadedFiles"),
        }
    }
}

/// 그래디언트 부스팅 학습 설정.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// 부스팅 라운드 수
    pub n_estimators: usize,
    /// 학습률 (shrinkage)
    pub learning_rate: f64,
    /// 트리 최대 깊이
    pub max_depth: usize,
    /// 리프당 최소 샘플 수
    pub min_samples_leaf: usize,
    /// 트리별 행 샘플링 비율
    pub subsample: f64,
    /// 트리별 피처 샘플링 비율
    pub feature_subsample: f64,
    /// 학습 곡선 측정 지점 수
    pub curve_points: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 20,
            subsample: 1.0,
            feature_subsample: 1.0,
            curve_points: 10,
        }
    }
}

/// 시뮬레이션 스트림 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 스트림당 최대 행 수
    pub max_rows: usize,
    /// 이벤트 간격 (밀리초)
    pub interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_rows: 30,
            interval_ms: 1000,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// 로그에 소스 파일명과 줄 번호 포함
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_location: false,
        }
    }
}

impl AppConfig {
    /// 파일(없어도 됨)과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("INSPECT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// `INSPECT_CONFIG` 경로 또는 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        let path = std::env::var("INSPECT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(path)
    }

    /// 설정 값의 유효성을 확인합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.server.port == 0 {
            return Err(CoreError::Config("server.port must be non-zero".into()));
        }
        let t = &self.training;
        if !(t.learning_rate > 0.0 && t.learning_rate <= 1.0) {
            return Err(CoreError::Config(format!(
                "training.learning_rate must be in (0, 1], got {}",
                t.learning_rate
            )));
        }
        for (name, ratio) in [
            ("subsample", t.subsample),
            ("feature_subsample", t.feature_subsample),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(CoreError::Config(format!(
                    "training.{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if t.curve_points == 0 {
            return Err(CoreError::Config("training.curve_points must be at least 1".into()));
        }
        if t.max_depth == 0 {
            return Err(CoreError::Config("training.max_depth must be at least 1".into()));
        }
        if t.n_estimators == 0 {
            return Err(CoreError::Config("training.n_estimators must be at least 1".into()));
        }
        Ok(())
    }

    /// `host:port` 문자열.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.simulation.max_rows, 30);
        assert_eq!(config.simulation.interval_ms, 1000);
        assert_eq!(config.bind_address(), "127.0.0.1:5000");
    }

    #[test]
    fn test_invalid_learning_rate_rejected() {
        let mut config = AppConfig::default();
        config.training.learning_rate = 0.0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
        config.training.learning_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_sampling_and_curve_points_rejected() {
        let mut config = AppConfig::default();
        config.training.subsample = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.training.feature_subsample = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.training.curve_points = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("UploadedFiles"));
        assert_eq!(config.training.n_estimators, 100);
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("inspect-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[server]\nport = 8081\n\n[training]\nmax_depth = 3\n\n[simulation]\nmax_rows = 5\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.training.max_depth, 3);
        assert_eq!(config.simulation.max_rows, 5);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_max_upload_bytes() {
        let mut server = ServerConfig::default();
        server.max_upload_mb = 1;
        assert_eq!(server.max_upload_bytes(), 1024 * 1024);
    }
}
