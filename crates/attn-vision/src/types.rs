//! Wire types for the extractor microservices.

use serde::{Deserialize, Serialize};

use attn_models::{BoundingBox, FaceDetection, Landmark};

#[derive(Debug, Clone, Serialize)]
pub struct DetectFacesRequest<'a> {
    pub frame_data: &'a str,
    pub request_id: &'a str,
    pub confidence_threshold: f64,
}

/// Corner-format box as returned by the detection services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireFace {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default)]
    pub confidence: f64,
}

impl WireFace {
    pub fn from_bbox(bbox: &BoundingBox, confidence: f64) -> Self {
        Self {
            x1: bbox.x,
            y1: bbox.y,
            x2: bbox.x2(),
            y2: bbox.y2(),
            confidence,
        }
    }
}

impl From<WireFace> for FaceDetection {
    fn from(face: WireFace) -> Self {
        FaceDetection::new(
            BoundingBox::from_xyxy(face.x1, face.y1, face.x2, face.y2),
            face.confidence,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectFacesResponse {
    #[serde(default)]
    pub faces: Vec<WireFace>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LandmarksRequest<'a> {
    pub frame_data: &'a str,
    pub faces: Vec<WireFace>,
    pub request_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LandmarkFace {
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LandmarksResponse {
    #[serde(default)]
    pub faces: Vec<LandmarkFace>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

/// Request body shared by the landmark-driven estimators.
#[derive(Debug, Clone, Serialize)]
pub struct LandmarkPayload<'a> {
    pub landmarks: &'a [Landmark],
    pub request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadPoseResponse {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GazeResponse {
    pub gaze_x: f64,
    pub gaze_y: f64,
    /// Service verdict; derived from `gaze_x` when absent
    #[serde(default)]
    pub is_looking_at_camera: Option<bool>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlinkResponse {
    pub avg_ear: f64,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

fn default_success() -> bool {
    true
}
