//! Hub metrics.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const HUB_MESSAGES_DELIVERED: &str = "attn_hub_messages_delivered_total";
    pub const HUB_MESSAGES_DROPPED: &str = "attn_hub_messages_dropped_total";
    pub const HUB_SUBSCRIBERS_ACTIVE: &str = "attn_hub_subscribers_active";
    pub const HUB_ROOMS_ACTIVE: &str = "attn_hub_rooms_active";

    pub const SAMPLES_QUEUED: &str = "attn_samples_queued_total";
    pub const SAMPLES_DROPPED: &str = "attn_samples_dropped_total";
    pub const SAMPLES_WRITTEN: &str = "attn_samples_written_total";
    pub const SAMPLES_FAILED: &str = "attn_samples_failed_total";
}

pub fn record_delivered(message_type: &str, count: u64) {
    if count > 0 {
        counter!(names::HUB_MESSAGES_DELIVERED, "type" => message_type.to_string()).increment(count);
    }
}

pub fn record_dropped(message_type: &str, count: u64) {
    if count > 0 {
        counter!(names::HUB_MESSAGES_DROPPED, "type" => message_type.to_string()).increment(count);
    }
}

pub fn set_active(subscribers: usize, rooms: usize) {
    gauge!(names::HUB_SUBSCRIBERS_ACTIVE).set(subscribers as f64);
    gauge!(names::HUB_ROOMS_ACTIVE).set(rooms as f64);
}

pub fn record_samples_queued(count: usize) {
    counter!(names::SAMPLES_QUEUED).increment(count as u64);
}

pub fn record_samples_dropped(count: usize) {
    counter!(names::SAMPLES_DROPPED).increment(count as u64);
}

pub fn record_sample_written(sink: &'static str) {
    counter!(names::SAMPLES_WRITTEN, "sink" => sink).increment(1);
}

pub fn record_sample_failed(sink: &'static str) {
    counter!(names::SAMPLES_FAILED, "sink" => sink).increment(1);
}
