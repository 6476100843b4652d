//! Attention scoring and alerting.
//!
//! `AttentionScorer` is a pure function from a face's features to a 0-100
//! score. `AlertEngine` turns scores and features into debounced alert events.

pub mod alerts;
pub mod config;
pub mod error;
pub mod scorer;

pub use alerts::{is_looking_away, AlertEngine};
pub use config::{AlertConfig, ScoringConfig};
pub use error::{ScoringError, ScoringResult};
pub use scorer::AttentionScorer;
