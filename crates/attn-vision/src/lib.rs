//! Face analysis for the attention pipeline.
//!
//! This crate provides:
//! - The `FeatureExtractor` contract, one call per analysis stage
//! - `RemoteExtractor`, an HTTP client for the face-analysis services
//! - `FaceTracker`, IoU track assignment with per-track blink history
//! - EAR and PERCLOS estimation

pub mod blink;
pub mod error;
pub mod extractor;
pub mod remote;
pub mod tracker;
pub mod types;

pub use blink::{ear_from_landmarks, eye_aspect_ratio, BlinkConfig, BlinkState, BlinkWindow};
pub use error::{VisionError, VisionResult};
pub use extractor::FeatureExtractor;
pub use remote::{RemoteExtractor, RemoteExtractorConfig};
pub use tracker::{FaceTracker, TrackerConfig, TrackerStats, TrackerUpdate};
