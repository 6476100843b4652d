//! Debounced alert generation.
//!
//! One engine serves one meeting. Suppression state is kept per
//! `(track, alert type)`, and all time comparisons use frame capture
//! timestamps so replayed or delayed frames debounce consistently.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use attn_models::{Alert, AlertType, AttentionScore, FeatureRecord, ParticipantKey, TrackId};

use crate::config::AlertConfig;

/// Whether the participant is looking away: gaze off camera or head turned
/// past the yaw threshold. Unknown measurements do not count.
pub fn is_looking_away(features: &FeatureRecord, yaw_threshold: f64) -> bool {
    let gaze_off = features
        .gaze
        .is_some_and(|g| g.is_finite() && !g.looking_at_camera);
    let head_turned = features
        .head_pose
        .is_some_and(|p| p.yaw.is_finite() && p.yaw.abs() > yaw_threshold);
    gaze_off || head_turned
}

/// Per-meeting alert engine.
#[derive(Debug, Default)]
pub struct AlertEngine {
    config: AlertConfig,
    last_fired: HashMap<(TrackId, AlertType), i64>,
}

impl AlertEngine {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            last_fired: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Evaluate every trigger for one face and return the alerts that fire.
    pub fn evaluate(
        &mut self,
        participant: &ParticipantKey,
        score: &AttentionScore,
        features: &FeatureRecord,
        now_ms: i64,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if score.value < self.config.not_attentive_below {
            let message = format!(
                "Attention score {} is below {}",
                score.value, self.config.not_attentive_below
            );
            self.try_fire(participant, AlertType::NotAttentive, message, now_ms, &mut alerts);
        }

        if is_looking_away(features, self.config.looking_away_yaw) {
            self.try_fire(
                participant,
                AlertType::LookingAway,
                "Participant is looking away from the screen".to_string(),
                now_ms,
                &mut alerts,
            );
        }

        if features.is_drowsy {
            self.try_fire(
                participant,
                AlertType::Drowsy,
                "Participant shows signs of drowsiness".to_string(),
                now_ms,
                &mut alerts,
            );
        }

        alerts
    }

    /// Drop suppression state for an expired track.
    pub fn forget(&mut self, track_id: TrackId) {
        self.last_fired.retain(|(id, _), _| *id != track_id);
    }

    fn cooldown_ms(&self, alert_type: AlertType) -> i64 {
        match alert_type {
            AlertType::NotAttentive => self.config.not_attentive_cooldown_ms,
            AlertType::LookingAway => self.config.looking_away_cooldown_ms,
            AlertType::Drowsy => self.config.drowsy_cooldown_ms,
        }
    }

    fn try_fire(
        &mut self,
        participant: &ParticipantKey,
        alert_type: AlertType,
        message: String,
        now_ms: i64,
        out: &mut Vec<Alert>,
    ) {
        let cooldown = self.cooldown_ms(alert_type);
        let key = (participant.track_id, alert_type);

        if let Some(&last) = self.last_fired.get(&key) {
            // Saturates so arbitrary capture times cannot overflow
            if now_ms.saturating_sub(last) <= cooldown {
                return;
            }
        }

        self.last_fired.insert(key, now_ms);
        debug!(
            participant = %participant,
            alert_type = alert_type.as_str(),
            "Alert fired"
        );

        let created_at = DateTime::<Utc>::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now);
        out.push(Alert::new(participant.clone(), alert_type, message, created_at));
    }
}
