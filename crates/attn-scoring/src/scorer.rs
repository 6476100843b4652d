//! Weighted fusion of per-face features into a 0-100 attention score.

use chrono::{DateTime, Utc};

use attn_models::{AttentionScore, FeatureRecord, Gaze, HeadPose, SubScores, TrackId};

use crate::config::ScoringConfig;

/// Stateless attention scorer.
///
/// Missing or non-finite measurements score zero for their component, so a
/// face that cannot be resolved yields a low score rather than no score.
#[derive(Debug, Clone, Default)]
pub struct AttentionScorer {
    config: ScoringConfig,
}

impl AttentionScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one face. The result depends only on the arguments.
    pub fn score(
        &self,
        track_id: TrackId,
        features: &FeatureRecord,
        computed_at: DateTime<Utc>,
    ) -> AttentionScore {
        let sub_scores = self.sub_scores(features);
        AttentionScore {
            track_id,
            value: self.fuse(&sub_scores),
            sub_scores,
            computed_at,
        }
    }

    pub fn sub_scores(&self, features: &FeatureRecord) -> SubScores {
        SubScores {
            gaze: features
                .gaze
                .filter(Gaze::is_finite)
                .map(|g| self.gaze_score(&g))
                .unwrap_or(0.0),
            head_pose: features
                .head_pose
                .filter(HeadPose::is_finite)
                .map(|p| self.head_pose_score(&p))
                .unwrap_or(0.0),
            eye_openness: features
                .ear
                .filter(|e| e.is_finite())
                .map(|e| self.eye_openness_score(e))
                .unwrap_or(0.0),
            presence: if features.present { 1.0 } else { 0.0 },
        }
    }

    /// Weighted sum scaled to 0-100.
    pub fn fuse(&self, sub: &SubScores) -> u8 {
        let c = &self.config;
        let weighted = c.gaze_weight * sub.gaze
            + c.head_pose_weight * sub.head_pose
            + c.eye_openness_weight * sub.eye_openness
            + c.presence_weight * sub.presence;

        if !weighted.is_finite() {
            return 0;
        }
        (weighted * 100.0).round().clamp(0.0, 100.0) as u8
    }

    fn gaze_score(&self, gaze: &Gaze) -> f64 {
        (1.0 - gaze.distance_from_center() / self.config.gaze_threshold).clamp(0.0, 1.0)
    }

    fn head_pose_score(&self, pose: &HeadPose) -> f64 {
        let c = &self.config;
        let yaw_penalty = (pose.yaw.abs() / c.head_yaw_threshold).min(1.0);
        let pitch_penalty = (pose.pitch.abs() / c.head_pitch_threshold).min(1.0);
        let penalty = c.yaw_penalty_share * yaw_penalty + (1.0 - c.yaw_penalty_share) * pitch_penalty;
        (1.0 - penalty).clamp(0.0, 1.0)
    }

    fn eye_openness_score(&self, ear: f64) -> f64 {
        if ear > self.config.ear_min_threshold {
            (ear / self.config.ear_open_threshold).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
