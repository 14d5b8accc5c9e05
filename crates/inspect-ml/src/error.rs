//! ML 모듈 에러 타입.

use thiserror::Error;

/// 학습/추론 중 발생할 수 있는 에러.
#[derive(Debug, Error)]
pub enum MlError {
    /// 유효하지 않은 입력 데이터
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 학습 또는 평가에 필요한 데이터 부족
    #[error("Insufficient data: need {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// 학습 실패
    #[error("Training error: {0}")]
    Training(String),

    /// 학습된 모델 없음
    #[error("Model not trained")]
    NotTrained,
}

/// ML 작업을 위한 Result 타입.
pub type MlResult<T> = Result<T, MlError>;

impl MlError {
    /// 다른 데이터나 구간으로 재시도하면 해결될 수 있는 에러인지 확인.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MlError::InsufficientData { .. } | MlError::InvalidInput(_)
        )
    }
}

impl From<inspect_core::CoreError> for MlError {
    fn from(err: inspect_core::CoreError) -> Self {
        MlError::InvalidInput(err.to_string())
    }
}
