//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pool is shutting down")]
    ShuttingDown,

    #[error("Scoring error: {0}")]
    Scoring(#[from] attn_scoring::ScoringError),

    #[error("Vision error: {0}")]
    Vision(#[from] attn_vision::VisionError),

    #[error("Hub error: {0}")]
    Hub(#[from] attn_hub::HubError),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
