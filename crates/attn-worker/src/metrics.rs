//! Pipeline metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_SUBMITTED: &str = "attn_frames_submitted_total";
    pub const FRAMES_DROPPED: &str = "attn_frames_dropped_total";
    pub const FRAMES_PROCESSED: &str = "attn_frames_processed_total";
    pub const FRAME_PROCESSING_SECONDS: &str = "attn_frame_processing_seconds";
    pub const STAGE_FAILURES: &str = "attn_extractor_stage_failures_total";
    pub const FACES_SCORED: &str = "attn_faces_scored_total";
    pub const ALERTS_FIRED: &str = "attn_alerts_fired_total";
    pub const ACTIVE_SESSIONS: &str = "attn_active_sessions";
}

pub fn record_frame_submitted() {
    counter!(names::FRAMES_SUBMITTED).increment(1);
}

pub fn record_frame_dropped(reason: &'static str) {
    counter!(names::FRAMES_DROPPED, "reason" => reason).increment(1);
}

pub fn record_frame_processed(duration_secs: f64, faces: usize) {
    counter!(names::FRAMES_PROCESSED).increment(1);
    histogram!(names::FRAME_PROCESSING_SECONDS).record(duration_secs);
    counter!(names::FACES_SCORED).increment(faces as u64);
}

pub fn record_stage_failure(stage: &'static str) {
    counter!(names::STAGE_FAILURES, "stage" => stage).increment(1);
}

pub fn record_alert(alert_type: &'static str) {
    counter!(names::ALERTS_FIRED, "type" => alert_type).increment(1);
}

pub fn set_active_sessions(worker: usize, count: usize) {
    gauge!(names::ACTIVE_SESSIONS, "worker" => worker.to_string()).set(count as f64);
}
