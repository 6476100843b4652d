//! Per-frame pipeline: detection, tracking, feature extraction, scoring
//! and alerting.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;

use attn_models::{
    FaceLandmarks, FaceResult, FeatureRecord, Frame, Gaze, HeadPose, ParticipantKey, ResultBatch,
    TrackedFace,
};
use attn_scoring::{is_looking_away, AttentionScorer};
use attn_vision::{ear_from_landmarks, FeatureExtractor};

use crate::config::PipelineConfig;
use crate::logging::MeetingLogger;
use crate::metrics;
use crate::session::MeetingSession;

/// Stage-level features of one face before blink history is applied.
#[derive(Debug, Clone, Default)]
struct RawFeatures {
    landmarks: Option<FaceLandmarks>,
    head_pose: Option<HeadPose>,
    gaze: Option<Gaze>,
    ear: Option<f64>,
}

/// Runs the pipeline for one frame against a meeting session.
pub struct FrameProcessor {
    extractor: Arc<dyn FeatureExtractor>,
    scorer: AttentionScorer,
    looking_away_yaw: f64,
}

impl FrameProcessor {
    pub fn new(extractor: Arc<dyn FeatureExtractor>, config: &PipelineConfig) -> Self {
        Self {
            extractor,
            scorer: AttentionScorer::new(config.scoring),
            looking_away_yaw: config.alerts.looking_away_yaw,
        }
    }

    /// Process one frame. Never fails: stage errors degrade the affected
    /// sub-scores and are logged.
    pub async fn process(&self, session: &mut MeetingSession, frame: &Frame) -> ResultBatch {
        let started = Instant::now();
        session.touch();

        let detections = match self.extractor.detect_faces(frame).await {
            Ok(detections) => detections,
            Err(e) => {
                metrics::record_stage_failure("detection");
                session.logger.log_stage_failure("detection", None, &e);
                Vec::new()
            }
        };

        let update = session.tracker.update(&detections);
        for track_id in &update.expired {
            session.alerts.forget(*track_id);
        }
        session.logger.log_tracks_expired(&update.expired);

        let logger = &session.logger;
        let raw = join_all(
            update
                .faces
                .iter()
                .map(|face| self.extract(frame, face, logger)),
        )
        .await;

        let computed_at = Utc::now();
        let mut faces = Vec::with_capacity(update.faces.len());
        let mut alerts = Vec::new();

        for (face, raw) in update.faces.into_iter().zip(raw) {
            let blink = match session.tracker.blink_window_mut(face.track_id) {
                Some(window) => {
                    if let Some(ear) = raw.ear {
                        window.push(ear, frame.timestamp_ms);
                    }
                    (!window.is_empty()).then(|| window.state())
                }
                None => None,
            };

            let features = FeatureRecord {
                landmarks: raw.landmarks,
                head_pose: raw.head_pose,
                gaze: raw.gaze,
                ear: raw.ear,
                perclos: blink.map(|b| b.perclos),
                blink_rate: blink.map(|b| b.blink_rate),
                is_drowsy: blink.is_some_and(|b| b.is_drowsy),
                present: true,
            };

            let score = self.scorer.score(face.track_id, &features, computed_at);
            let participant = ParticipantKey::new(session.meeting_id.clone(), face.track_id);
            let fired = session
                .alerts
                .evaluate(&participant, &score, &features, frame.timestamp_ms);
            for alert in &fired {
                metrics::record_alert(alert.alert_type.as_str());
            }
            alerts.extend(fired);

            faces.push(FaceResult {
                is_looking_away: is_looking_away(&features, self.looking_away_yaw),
                face,
                features,
                score,
            });
        }

        let elapsed = started.elapsed();
        metrics::record_frame_processed(elapsed.as_secs_f64(), faces.len());

        ResultBatch {
            meeting_id: frame.meeting_id.clone(),
            frame_timestamp_ms: frame.timestamp_ms,
            faces,
            alerts,
            processing_time_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    /// Landmarks first, then head pose, gaze and blink concurrently.
    async fn extract(&self, frame: &Frame, face: &TrackedFace, logger: &MeetingLogger) -> RawFeatures {
        let landmarks = match self.extractor.extract_landmarks(frame, face).await {
            Ok(landmarks) => landmarks,
            Err(e) => {
                metrics::record_stage_failure("landmarks");
                logger.log_stage_failure("landmarks", Some(face.track_id), &e);
                return RawFeatures::default();
            }
        };

        let (head_pose, gaze, blink) = tokio::join!(
            self.extractor.estimate_head_pose(&landmarks),
            self.extractor.estimate_gaze(&landmarks),
            self.extractor.estimate_blink(&landmarks, face.track_id),
        );

        let head_pose = match head_pose {
            Ok(pose) if pose.is_finite() => Some(pose),
            Ok(_) => None,
            Err(e) => {
                metrics::record_stage_failure("head_pose");
                logger.log_stage_failure("head_pose", Some(face.track_id), &e);
                None
            }
        };

        let gaze = match gaze {
            Ok(gaze) if gaze.is_finite() => Some(gaze),
            Ok(_) => None,
            Err(e) => {
                metrics::record_stage_failure("gaze");
                logger.log_stage_failure("gaze", Some(face.track_id), &e);
                None
            }
        };

        let ear = match blink {
            Ok(ear) if ear.is_finite() => Some(ear),
            Ok(_) => ear_from_landmarks(&landmarks),
            Err(e) => {
                metrics::record_stage_failure("blink");
                logger.log_stage_failure("blink", Some(face.track_id), &e);
                ear_from_landmarks(&landmarks)
            }
        };

        RawFeatures {
            landmarks: Some(landmarks),
            head_pose,
            gaze,
            ear,
        }
    }
}
