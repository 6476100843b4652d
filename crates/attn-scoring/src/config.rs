//! Scoring and alerting parameters.

use serde::{Deserialize, Serialize};

use crate::error::{ScoringError, ScoringResult};

/// Weights and normalization thresholds for score fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub gaze_weight: f64,
    pub head_pose_weight: f64,
    pub eye_openness_weight: f64,
    pub presence_weight: f64,

    /// Yaw (degrees) at which the yaw penalty saturates
    pub head_yaw_threshold: f64,
    /// Pitch (degrees) at which the pitch penalty saturates
    pub head_pitch_threshold: f64,
    /// Share of the head score penalty taken by yaw; pitch takes the rest
    pub yaw_penalty_share: f64,
    /// Gaze distance from centre at which the gaze score reaches zero
    pub gaze_threshold: f64,
    /// EAR at or above which the eyes count as fully open
    pub ear_open_threshold: f64,
    /// EAR at or below which the eyes count as closed
    pub ear_min_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            gaze_weight: 0.35,
            head_pose_weight: 0.30,
            eye_openness_weight: 0.20,
            presence_weight: 0.15,
            head_yaw_threshold: 30.0,
            head_pitch_threshold: 25.0,
            yaw_penalty_share: 0.6,
            gaze_threshold: 0.3,
            ear_open_threshold: 0.25,
            ear_min_threshold: 0.15,
        }
    }
}

impl ScoringConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> ScoringResult<Self> {
        let defaults = Self::default();
        let config = Self {
            gaze_weight: env_f64("ATTENTION_GAZE_WEIGHT", defaults.gaze_weight),
            head_pose_weight: env_f64("ATTENTION_HEAD_POSE_WEIGHT", defaults.head_pose_weight),
            eye_openness_weight: env_f64(
                "ATTENTION_EYE_OPENNESS_WEIGHT",
                defaults.eye_openness_weight,
            ),
            presence_weight: env_f64("ATTENTION_PRESENCE_WEIGHT", defaults.presence_weight),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Weights must be non-negative and sum to 1.
    pub fn validate(&self) -> ScoringResult<()> {
        let weights = [
            self.gaze_weight,
            self.head_pose_weight,
            self.eye_openness_weight,
            self.presence_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ScoringError::invalid_config("weights must be finite and non-negative"));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ScoringError::invalid_config(format!(
                "weights must sum to 1.0, got {:.4}",
                sum
            )));
        }
        if self.head_yaw_threshold <= 0.0
            || self.head_pitch_threshold <= 0.0
            || self.gaze_threshold <= 0.0
            || self.ear_open_threshold <= 0.0
        {
            return Err(ScoringError::invalid_config("thresholds must be positive"));
        }
        Ok(())
    }
}

/// Alert triggers and cooldowns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Score below which `not_attentive` fires
    pub not_attentive_below: u8,
    pub not_attentive_cooldown_ms: i64,
    /// Absolute yaw (degrees) above which the participant is looking away
    pub looking_away_yaw: f64,
    pub looking_away_cooldown_ms: i64,
    pub drowsy_cooldown_ms: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            not_attentive_below: 40,
            not_attentive_cooldown_ms: 10_000,
            looking_away_yaw: 30.0,
            looking_away_cooldown_ms: 5_000,
            drowsy_cooldown_ms: 5_000,
        }
    }
}

impl AlertConfig {
    pub fn from_env() -> ScoringResult<Self> {
        let defaults = Self::default();
        let config = Self {
            not_attentive_below: std::env::var("ALERT_NOT_ATTENTIVE_BELOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.not_attentive_below),
            not_attentive_cooldown_ms: env_i64(
                "ALERT_NOT_ATTENTIVE_COOLDOWN_MS",
                defaults.not_attentive_cooldown_ms,
            ),
            looking_away_yaw: env_f64("ALERT_LOOKING_AWAY_YAW", defaults.looking_away_yaw),
            looking_away_cooldown_ms: env_i64(
                "ALERT_LOOKING_AWAY_COOLDOWN_MS",
                defaults.looking_away_cooldown_ms,
            ),
            drowsy_cooldown_ms: env_i64("ALERT_DROWSY_COOLDOWN_MS", defaults.drowsy_cooldown_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// Cooldowns must be non-negative and the yaw trigger positive.
    pub fn validate(&self) -> ScoringResult<()> {
        let cooldowns = [
            self.not_attentive_cooldown_ms,
            self.looking_away_cooldown_ms,
            self.drowsy_cooldown_ms,
        ];
        if cooldowns.iter().any(|c| *c < 0) {
            return Err(ScoringError::invalid_config("alert cooldowns must be non-negative"));
        }
        if !self.looking_away_yaw.is_finite() || self.looking_away_yaw <= 0.0 {
            return Err(ScoringError::invalid_config(
                "looking-away yaw threshold must be positive",
            ));
        }
        Ok(())
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn test_weights_not_summing_to_one_rejected() {
        let config = ScoringConfig {
            gaze_weight: 0.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ScoringError::InvalidConfig(_))));
    }

    #[test]
    fn test_alert_defaults() {
        let config = AlertConfig::default();
        assert_eq!(config.not_attentive_below, 40);
        assert_eq!(config.not_attentive_cooldown_ms, 10_000);
        assert_eq!(config.looking_away_cooldown_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_cooldown_rejected() {
        let config = AlertConfig {
            drowsy_cooldown_ms: -1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ScoringError::InvalidConfig(_))));

        let config = AlertConfig {
            not_attentive_cooldown_ms: i64::MIN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_yaw_trigger_rejected() {
        for yaw in [0.0, -10.0, f64::NAN] {
            let config = AlertConfig {
                looking_away_yaw: yaw,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "yaw {} accepted", yaw);
        }
    }
}
