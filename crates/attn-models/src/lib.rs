//! Shared data models for the attention pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Meeting, subscriber and track identifiers
//! - Frames, detections and per-face feature records
//! - Attention scores and alerts
//! - Per-frame result batches
//! - WebSocket message schemas

pub mod alert;
pub mod batch;
pub mod features;
pub mod geometry;
pub mod ids;
pub mod score;
pub mod ws;

// Re-export common types
pub use alert::{Alert, AlertSeverity, AlertType};
pub use batch::{FaceResult, ResultBatch};
pub use features::{FaceDetection, FaceLandmarks, FeatureRecord, Frame, Gaze, HeadPose, TrackedFace};
pub use geometry::{BoundingBox, Landmark};
pub use ids::{MeetingId, ParticipantKey, SubscriberId, TrackId};
pub use score::{to_percent, AttentionScore, SubScores};
pub use ws::{ClientMessage, FaceSummary, ParticipantAction, WsMessage, WsMessageType};
