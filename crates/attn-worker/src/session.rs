//! Per-meeting pipeline state.

use std::time::{Duration, Instant};

use attn_models::MeetingId;
use attn_scoring::AlertEngine;
use attn_vision::FaceTracker;

use crate::config::PipelineConfig;
use crate::logging::MeetingLogger;

/// Tracker and alert state for one meeting, owned by a single worker.
pub struct MeetingSession {
    pub meeting_id: MeetingId,
    pub tracker: FaceTracker,
    pub alerts: AlertEngine,
    pub logger: MeetingLogger,
    last_frame_at: Instant,
    frames: u64,
}

impl MeetingSession {
    pub fn new(meeting_id: MeetingId, worker: usize, config: &PipelineConfig) -> Self {
        let logger = MeetingLogger::new(&meeting_id, worker);
        Self {
            meeting_id,
            tracker: FaceTracker::new(config.tracker),
            alerts: AlertEngine::new(config.alerts),
            logger,
            last_frame_at: Instant::now(),
            frames: 0,
        }
    }

    /// Record that a frame for this meeting is being processed.
    pub fn touch(&mut self) {
        self.last_frame_at = Instant::now();
        self.frames += 1;
    }

    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_frame_at.elapsed() > timeout
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
