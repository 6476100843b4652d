//! Attention alert events.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::ParticipantKey;

/// Kind of attention alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Fused score under the attentiveness threshold
    NotAttentive,
    /// Head turned away or gaze off camera
    LookingAway,
    /// Sustained eye closure
    Drowsy,
}

impl AlertType {
    pub const ALL: [AlertType; 3] = [
        AlertType::NotAttentive,
        AlertType::LookingAway,
        AlertType::Drowsy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::NotAttentive => "not_attentive",
            AlertType::LookingAway => "looking_away",
            AlertType::Drowsy => "drowsy",
        }
    }

    /// Severity attached to every alert of this type.
    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertType::NotAttentive => AlertSeverity::Info,
            AlertType::LookingAway => AlertSeverity::Warning,
            AlertType::Drowsy => AlertSeverity::Critical,
        }
    }
}

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// A fired alert. Suppression state lives in the alert engine, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub participant: ParticipantKey,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        participant: ParticipantKey,
        alert_type: AlertType,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            participant,
            alert_type,
            severity: alert_type.severity(),
            message: message.into(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{MeetingId, TrackId};

    #[test]
    fn test_alert_type_severity_mapping() {
        assert_eq!(AlertType::NotAttentive.severity(), AlertSeverity::Info);
        assert_eq!(AlertType::LookingAway.severity(), AlertSeverity::Warning);
        assert_eq!(AlertType::Drowsy.severity(), AlertSeverity::Critical);
    }

    #[test]
    fn test_alert_type_serialization() {
        let json = serde_json::to_string(&AlertType::LookingAway).unwrap();
        assert_eq!(json, "\"looking_away\"");
    }

    #[test]
    fn test_alert_new_sets_severity() {
        let key = ParticipantKey::new(MeetingId::from("m"), TrackId(1));
        let alert = Alert::new(key, AlertType::Drowsy, "eyes closed", Utc::now());
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }
}
