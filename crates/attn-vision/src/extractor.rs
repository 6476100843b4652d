//! Feature extractor contract.
//!
//! Each pipeline stage is a separate call so a failure is reported per stage
//! and the caller can fall back to a neutral value for that stage alone.

use async_trait::async_trait;

use attn_models::{FaceDetection, FaceLandmarks, Frame, Gaze, HeadPose, TrackId, TrackedFace};

use crate::error::VisionResult;

/// Face analysis capabilities consumed by the pipeline.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Detect faces in a frame.
    async fn detect_faces(&self, frame: &Frame) -> VisionResult<Vec<FaceDetection>>;

    /// Extract the dense landmark mesh for one tracked face.
    async fn extract_landmarks(&self, frame: &Frame, face: &TrackedFace)
        -> VisionResult<FaceLandmarks>;

    /// Estimate head orientation from landmarks.
    async fn estimate_head_pose(&self, landmarks: &FaceLandmarks) -> VisionResult<HeadPose>;

    /// Estimate gaze direction from landmarks.
    async fn estimate_gaze(&self, landmarks: &FaceLandmarks) -> VisionResult<Gaze>;

    /// Estimate the eye aspect ratio (averaged over both eyes) for one track.
    async fn estimate_blink(&self, landmarks: &FaceLandmarks, track_id: TrackId)
        -> VisionResult<f64>;

    /// Extractor name for logging.
    fn name(&self) -> &'static str;
}
