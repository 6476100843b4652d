//! Scoring error types.

use thiserror::Error;

pub type ScoringResult<T> = Result<T, ScoringError>;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Invalid scoring config: {0}")]
    InvalidConfig(String),
}

impl ScoringError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
