//! Attention score models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::TrackId;

/// Component scores feeding the weighted fusion, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubScores {
    pub gaze: f64,
    pub head_pose: f64,
    pub eye_openness: f64,
    pub presence: f64,
}

/// Attention score for one face in one frame. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttentionScore {
    pub track_id: TrackId,
    /// Fused score, 0-100 inclusive
    pub value: u8,
    pub sub_scores: SubScores,
    pub computed_at: DateTime<Utc>,
}

/// Convert a unit-interval sub-score into the canonical 0-100 domain.
pub fn to_percent(unit: f64) -> f64 {
    (unit.clamp(0.0, 1.0) * 1000.0).round() / 10.0
}
