//! Vision error types.

use thiserror::Error;

pub type VisionResult<T> = Result<T, VisionError>;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Extractor service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Not enough landmarks: {0}")]
    MissingLandmarks(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisionError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn missing_landmarks(msg: impl Into<String>) -> Self {
        Self::MissingLandmarks(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VisionError::ServiceUnavailable(_) | VisionError::Timeout(_) | VisionError::Network(_)
        )
    }
}
