//! Structured per-meeting logging.
//!
//! Gives every pipeline log line the same meeting and worker fields so a
//! single meeting can be followed across frames.

use tracing::{debug, info, warn, Span};

use attn_models::{MeetingId, ResultBatch, TrackId};
use attn_vision::TrackerStats;

/// Meeting logger for structured logging with consistent fields.
#[derive(Debug, Clone)]
pub struct MeetingLogger {
    meeting_id: String,
    worker: usize,
}

impl MeetingLogger {
    pub fn new(meeting_id: &MeetingId, worker: usize) -> Self {
        Self {
            meeting_id: meeting_id.to_string(),
            worker,
        }
    }

    pub fn log_session_started(&self) {
        info!(
            meeting_id = %self.meeting_id,
            worker = self.worker,
            "Meeting session started"
        );
    }

    pub fn log_session_evicted(&self, frames: u64, tracks: &TrackerStats) {
        info!(
            meeting_id = %self.meeting_id,
            worker = self.worker,
            frames,
            tracks_created = tracks.total_created,
            tracks_live = tracks.active_tracks + tracks.lost_tracks,
            "Meeting session evicted after idle timeout"
        );
    }

    /// A stage failed; the affected sub-score falls back to its neutral value.
    pub fn log_stage_failure(
        &self,
        stage: &str,
        track_id: Option<TrackId>,
        error: &dyn std::fmt::Display,
    ) {
        warn!(
            meeting_id = %self.meeting_id,
            worker = self.worker,
            stage,
            track_id = track_id.map(|t| t.value()),
            error = %error,
            "Extractor stage failed, using neutral default"
        );
    }

    pub fn log_tracks_expired(&self, expired: &[TrackId]) {
        if !expired.is_empty() {
            debug!(
                meeting_id = %self.meeting_id,
                worker = self.worker,
                expired = ?expired,
                "Tracks expired"
            );
        }
    }

    pub fn log_batch(&self, batch: &ResultBatch, delivered: usize) {
        debug!(
            meeting_id = %self.meeting_id,
            worker = self.worker,
            faces = batch.faces.len(),
            alerts = batch.alerts.len(),
            delivered,
            processing_ms = batch.processing_time_ms,
            "Frame processed"
        );
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    /// Create a tracing span for work on this meeting.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "meeting",
            meeting_id = %self.meeting_id,
            worker = self.worker
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_logger_creation() {
        let logger = MeetingLogger::new(&MeetingId::from("m-9"), 2);
        assert_eq!(logger.meeting_id(), "m-9");
    }
}
