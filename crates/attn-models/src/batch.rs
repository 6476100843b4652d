//! Per-frame pipeline output.

use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::features::{FeatureRecord, TrackedFace};
use crate::ids::MeetingId;
use crate::score::AttentionScore;

/// Scored result for one tracked face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceResult {
    pub face: TrackedFace,
    pub features: FeatureRecord,
    pub score: AttentionScore,
    pub is_looking_away: bool,
}

/// Everything produced by processing one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBatch {
    pub meeting_id: MeetingId,
    pub frame_timestamp_ms: i64,
    pub faces: Vec<FaceResult>,
    pub alerts: Vec<Alert>,
    pub processing_time_ms: f64,
}

impl ResultBatch {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
