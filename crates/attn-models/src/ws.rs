//! WebSocket message types.
//!
//! Outbound messages are a tagged union so subscribers never receive
//! untyped payloads. Inbound client messages are validated here at the
//! boundary and rejected as a whole when malformed.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertSeverity, AlertType};
use crate::batch::{FaceResult, ResultBatch};
use crate::geometry::BoundingBox;
use crate::ids::{MeetingId, SubscriberId, TrackId};
use crate::score::to_percent;

/// WebSocket message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    AttentionUpdate,
    Alert,
    ParticipantUpdate,
    Error,
}

impl WsMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WsMessageType::AttentionUpdate => "attention_update",
            WsMessageType::Alert => "alert",
            WsMessageType::ParticipantUpdate => "participant_update",
            WsMessageType::Error => "error",
        }
    }
}

/// One face inside an `attention_update` message. Scores are on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaceSummary {
    pub track_id: TrackId,
    pub bbox: BoundingBox,
    pub attention_score: u8,
    pub gaze_score: f64,
    pub head_pose_score: f64,
    pub eye_openness_score: f64,
    pub is_looking_away: bool,
    pub is_drowsy: bool,
    /// Blinks per minute, once the track has a blink window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blink_rate: Option<f64>,
}

impl From<&FaceResult> for FaceSummary {
    fn from(result: &FaceResult) -> Self {
        let sub = &result.score.sub_scores;
        Self {
            track_id: result.face.track_id,
            bbox: result.face.bbox,
            attention_score: result.score.value,
            gaze_score: to_percent(sub.gaze),
            head_pose_score: to_percent(sub.head_pose),
            eye_openness_score: to_percent(sub.eye_openness),
            is_looking_away: result.is_looking_away,
            is_drowsy: result.features.is_drowsy,
            blink_rate: result.features.blink_rate,
        }
    }
}

/// Whether a viewer joined or left a meeting room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantAction {
    Joined,
    Left,
}

/// Outbound WebSocket message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Scores for every face in one processed frame
    AttentionUpdate {
        #[serde(rename = "meetingId")]
        meeting_id: MeetingId,
        faces: Vec<FaceSummary>,
    },

    /// A fired attention alert
    Alert {
        #[serde(rename = "participantId")]
        participant_id: String,
        #[serde(rename = "alertType")]
        alert_type: AlertType,
        severity: AlertSeverity,
        message: String,
        #[serde(rename = "createdAt")]
        created_at: DateTime<Utc>,
    },

    /// A viewer connected to or disconnected from the room
    ParticipantUpdate {
        #[serde(rename = "meetingId")]
        meeting_id: MeetingId,
        action: ParticipantAction,
        #[serde(rename = "subscriberId")]
        subscriber_id: SubscriberId,
    },

    /// Error reported to a single connection
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl WsMessage {
    /// Build the `attention_update` message for a batch.
    pub fn attention_update(batch: &ResultBatch) -> Self {
        WsMessage::AttentionUpdate {
            meeting_id: batch.meeting_id.clone(),
            faces: batch.faces.iter().map(FaceSummary::from).collect(),
        }
    }

    pub fn alert(alert: &Alert) -> Self {
        WsMessage::Alert {
            participant_id: alert.participant.participant_id(),
            alert_type: alert.alert_type,
            severity: alert.severity,
            message: alert.message.clone(),
            created_at: alert.created_at,
        }
    }

    pub fn participant_update(
        meeting_id: MeetingId,
        action: ParticipantAction,
        subscriber_id: SubscriberId,
    ) -> Self {
        WsMessage::ParticipantUpdate {
            meeting_id,
            action,
            subscriber_id,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        WsMessage::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn message_type(&self) -> WsMessageType {
        match self {
            WsMessage::AttentionUpdate { .. } => WsMessageType::AttentionUpdate,
            WsMessage::Alert { .. } => WsMessageType::Alert,
            WsMessage::ParticipantUpdate { .. } => WsMessageType::ParticipantUpdate,
            WsMessage::Error { .. } => WsMessageType::Error,
        }
    }
}

/// Inbound message from a WebSocket client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A captured frame, base64 encoded
    Frame {
        #[serde(rename = "frameData")]
        frame_data: String,
        #[serde(default, rename = "timestampMs")]
        timestamp_ms: Option<i64>,
    },
    /// Keepalive
    Ping,
}
