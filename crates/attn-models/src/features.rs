//! Frames and per-face feature records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Landmark};
use crate::ids::{MeetingId, TrackId};

/// A captured video frame awaiting inference.
///
/// The image payload is opaque to the pipeline and only handed to the
/// feature extractors.
#[derive(Debug, Clone)]
pub struct Frame {
    pub meeting_id: MeetingId,
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    /// Encoded image bytes (JPEG/PNG as produced by the capture layer)
    pub image: Vec<u8>,
}

impl Frame {
    pub fn new(meeting_id: impl Into<MeetingId>, image: Vec<u8>, timestamp_ms: i64) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            timestamp_ms,
            image,
        }
    }
}

/// Raw detector output before track assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub confidence: f64,
}

impl FaceDetection {
    pub fn new(bbox: BoundingBox, confidence: f64) -> Self {
        Self { bbox, confidence }
    }
}

/// A detection the tracker matched to a track in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFace {
    pub track_id: TrackId,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct HeadPose {
    /// Left/right rotation
    pub yaw: f64,
    /// Up/down rotation
    pub pitch: f64,
    /// Tilt
    pub roll: f64,
}

impl HeadPose {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    pub fn is_finite(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite() && self.roll.is_finite()
    }
}

/// Gaze offset from the camera centre, each axis normalized to [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Gaze {
    pub x: f64,
    pub y: f64,
    pub looking_at_camera: bool,
}

impl Gaze {
    /// Horizontal offset under which the participant counts as looking at the camera.
    pub const LOOKING_AT_CAMERA_THRESHOLD: f64 = 0.3;

    /// Build a gaze sample, deriving `looking_at_camera` from the horizontal offset.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            looking_at_camera: x.abs() < Self::LOOKING_AT_CAMERA_THRESHOLD,
        }
    }

    /// Euclidean distance from the centre point.
    pub fn distance_from_center(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Dense facial landmarks in MediaPipe FaceMesh ordering (468/478 points).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FaceLandmarks {
    pub points: Vec<Landmark>,
}

impl FaceLandmarks {
    /// Six-point outline of the left eye: outer corner, two upper, inner corner, two lower.
    pub const LEFT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];
    /// Six-point outline of the right eye, same ordering as `LEFT_EYE`.
    pub const RIGHT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn left_eye(&self) -> Option<[Landmark; 6]> {
        self.pick(&Self::LEFT_EYE)
    }

    pub fn right_eye(&self) -> Option<[Landmark; 6]> {
        self.pick(&Self::RIGHT_EYE)
    }

    fn pick(&self, indices: &[usize; 6]) -> Option<[Landmark; 6]> {
        let mut out = [Landmark::default(); 6];
        for (slot, &idx) in out.iter_mut().zip(indices.iter()) {
            *slot = *self.points.get(idx)?;
        }
        Some(out)
    }
}

/// Everything the extractors learned about one tracked face in one frame.
///
/// Every measurement is optional: a missing value means the corresponding
/// extractor stage failed or had nothing to work with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    #[serde(skip)]
    pub landmarks: Option<FaceLandmarks>,
    pub head_pose: Option<HeadPose>,
    pub gaze: Option<Gaze>,
    /// Eye aspect ratio averaged over both eyes
    pub ear: Option<f64>,
    /// Fraction of the trailing EAR window with eyes closed
    pub perclos: Option<f64>,
    /// Blinks per minute for this track
    pub blink_rate: Option<f64>,
    pub is_drowsy: bool,
    /// Whether the face was tracked in this frame
    pub present: bool,
}

impl FeatureRecord {
    /// Record for a face that was tracked but produced no usable features.
    pub fn present_only() -> Self {
        Self {
            present: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaze_looking_at_camera_derivation() {
        assert!(Gaze::new(0.1, 0.9).looking_at_camera);
        assert!(!Gaze::new(-0.4, 0.0).looking_at_camera);
        assert!((Gaze::new(0.3, 0.4).distance_from_center() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_eye_outline_requires_full_mesh() {
        let sparse = FaceLandmarks::new(vec![Landmark::new(0.0, 0.0); 10]);
        assert!(sparse.left_eye().is_none());

        let full = FaceLandmarks::new(vec![Landmark::new(1.0, 2.0); 478]);
        let eye = full.right_eye().unwrap();
        assert_eq!(eye[0], Landmark::new(1.0, 2.0));
    }

    #[test]
    fn test_feature_record_skips_landmarks_on_wire() {
        let record = FeatureRecord {
            landmarks: Some(FaceLandmarks::new(vec![Landmark::new(1.0, 1.0)])),
            ear: Some(0.3),
            present: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("landmarks"));
        assert!(json.contains("\"ear\":0.3"));
    }
}
