//! Pipeline worker configuration.

use std::time::Duration;

use attn_scoring::{AlertConfig, ScoringConfig};
use attn_vision::{BlinkConfig, TrackerConfig};

use crate::error::{WorkerError, WorkerResult};

/// Pipeline worker configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of worker tasks; each owns one intake shard
    pub workers: usize,
    /// Bounded intake capacity per worker
    pub queue_capacity: usize,
    /// Sessions without frames for this long are evicted
    pub session_idle_timeout: Duration,
    /// How often workers scan for idle sessions
    pub eviction_interval: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    pub tracker: TrackerConfig,
    pub scoring: ScoringConfig,
    pub alerts: AlertConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 32,
            session_idle_timeout: Duration::from_secs(60),
            eviction_interval: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(10),
            tracker: TrackerConfig::default(),
            scoring: ScoringConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let tracker_defaults = TrackerConfig::default();
        let blink_defaults = BlinkConfig::default();

        let config = Self {
            workers: std::env::var("PIPELINE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            queue_capacity: std::env::var("PIPELINE_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(32),
            session_idle_timeout: Duration::from_secs(
                std::env::var("PIPELINE_SESSION_IDLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            eviction_interval: Duration::from_secs(
                std::env::var("PIPELINE_EVICTION_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("PIPELINE_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            tracker: TrackerConfig {
                min_confidence: std::env::var("TRACKER_MIN_CONFIDENCE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(tracker_defaults.min_confidence),
                match_iou_threshold: std::env::var("TRACKER_MATCH_IOU")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(tracker_defaults.match_iou_threshold),
                lost_track_buffer: std::env::var("TRACKER_LOST_BUFFER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(tracker_defaults.lost_track_buffer),
                blink: BlinkConfig {
                    window_size: std::env::var("PERCLOS_WINDOW")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(blink_defaults.window_size),
                    ..blink_defaults
                },
            },
            scoring: ScoringConfig::from_env()?,
            alerts: AlertConfig::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.workers == 0 {
            return Err(WorkerError::config_error("PIPELINE_WORKERS must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(WorkerError::config_error(
                "PIPELINE_QUEUE_CAPACITY must be at least 1",
            ));
        }
        if self.eviction_interval.is_zero() {
            return Err(WorkerError::config_error(
                "PIPELINE_EVICTION_INTERVAL_SECS must be at least 1",
            ));
        }
        if self.tracker.blink.window_size == 0 {
            return Err(WorkerError::config_error("PERCLOS_WINDOW must be at least 1"));
        }
        self.scoring.validate()?;
        self.alerts.validate()?;
        Ok(())
    }
}
