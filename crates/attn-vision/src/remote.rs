//! HTTP client for the face-analysis microservices.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use attn_models::{FaceDetection, FaceLandmarks, Frame, Gaze, HeadPose, TrackId, TrackedFace};

use crate::error::{VisionError, VisionResult};
use crate::extractor::FeatureExtractor;
use crate::types::{
    BlinkResponse, DetectFacesRequest, DetectFacesResponse, GazeResponse, HeadPoseResponse,
    HealthResponse, LandmarkPayload, LandmarksRequest, LandmarksResponse, WireFace,
};

const RETRY_BASE_DELAY_MS: u64 = 50;
const RETRY_MAX_DELAY_MS: u64 = 5_000;

/// Configuration for the remote extractor.
#[derive(Debug, Clone)]
pub struct RemoteExtractorConfig {
    pub face_detection_url: String,
    pub landmark_detection_url: String,
    pub head_pose_url: String,
    pub gaze_tracking_url: String,
    pub blink_detection_url: String,
    /// Minimum detector confidence requested from the face detector
    pub detection_confidence: f64,
    /// Per-request timeout
    pub timeout: Duration,
    /// Max retries for retryable failures
    pub max_retries: u32,
}

impl Default for RemoteExtractorConfig {
    fn default() -> Self {
        Self {
            face_detection_url: "http://localhost:8052".to_string(),
            landmark_detection_url: "http://localhost:8053".to_string(),
            head_pose_url: "http://localhost:8054".to_string(),
            gaze_tracking_url: "http://localhost:8055".to_string(),
            blink_detection_url: "http://localhost:8056".to_string(),
            detection_confidence: 0.5,
            timeout: Duration::from_secs(5),
            max_retries: 2,
        }
    }
}

impl RemoteExtractorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let url = |key: &str, fallback: String| std::env::var(key).unwrap_or(fallback);

        Self {
            face_detection_url: url("FACE_DETECTION_URL", defaults.face_detection_url),
            landmark_detection_url: url("LANDMARK_DETECTION_URL", defaults.landmark_detection_url),
            head_pose_url: url("HEAD_POSE_URL", defaults.head_pose_url),
            gaze_tracking_url: url("GAZE_TRACKING_URL", defaults.gaze_tracking_url),
            blink_detection_url: url("BLINK_DETECTION_URL", defaults.blink_detection_url),
            detection_confidence: std::env::var("FACE_DETECTION_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.detection_confidence),
            timeout: Duration::from_millis(
                std::env::var("EXTRACTOR_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5_000),
            ),
            max_retries: std::env::var("EXTRACTOR_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }

    /// Point every stage at the same base URL.
    pub fn single_host(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            face_detection_url: base_url.clone(),
            landmark_detection_url: base_url.clone(),
            head_pose_url: base_url.clone(),
            gaze_tracking_url: base_url.clone(),
            blink_detection_url: base_url,
            ..Self::default()
        }
    }
}

/// Feature extractor backed by the face-analysis HTTP services.
pub struct RemoteExtractor {
    http: Client,
    config: RemoteExtractorConfig,
}

impl RemoteExtractor {
    pub fn new(config: RemoteExtractorConfig) -> VisionResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(VisionError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> VisionResult<Self> {
        Self::new(RemoteExtractorConfig::from_env())
    }

    pub fn config(&self) -> &RemoteExtractorConfig {
        &self.config
    }

    /// Check if every stage service reports healthy.
    pub async fn health_check(&self) -> VisionResult<bool> {
        let mut urls = vec![
            &self.config.face_detection_url,
            &self.config.landmark_detection_url,
            &self.config.head_pose_url,
            &self.config.gaze_tracking_url,
            &self.config.blink_detection_url,
        ];
        urls.sort();
        urls.dedup();

        for base in urls {
            let url = format!("{}/health", base);
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let health: HealthResponse = response.json().await?;
                    if health.status != "healthy" && health.status != "ok" {
                        warn!(url = %url, status = %health.status, "Extractor service unhealthy");
                        return Ok(false);
                    }
                }
                Ok(response) => {
                    warn!(url = %url, status = %response.status(), "Extractor health check failed");
                    return Ok(false);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Extractor health check error");
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> VisionResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        debug!(url = %url, "Sending extractor request");

        self.with_retry(|| async {
            let response = self
                .http
                .post(url)
                .json(body)
                .send()
                .await
                .map_err(|e| self.classify(e))?;

            let status = response.status();
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                return Err(VisionError::ServiceUnavailable(format!(
                    "{} returned {}",
                    url, status
                )));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(VisionError::RequestFailed(format!(
                    "{} returned {}: {}",
                    url, status, body
                )));
            }

            let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
            Ok(serde_json::from_slice::<R>(&bytes)?)
        })
        .await
    }

    fn classify(&self, e: reqwest::Error) -> VisionError {
        if e.is_timeout() {
            VisionError::Timeout(self.config.timeout.as_secs())
        } else {
            VisionError::Network(e)
        }
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> VisionResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = VisionResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Extractor request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| VisionError::RequestFailed("Unknown error".to_string())))
    }
}

/// Exponential backoff from 50ms, capped.
fn retry_delay(attempt: u32) -> Duration {
    let millis = RETRY_BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(millis.min(RETRY_MAX_DELAY_MS))
}

fn request_id(frame: &Frame) -> String {
    format!("{}-{}", frame.meeting_id, frame.timestamp_ms)
}

fn check_success(success: bool, error: String, stage: &str) -> VisionResult<()> {
    if success {
        Ok(())
    } else {
        Err(VisionError::RequestFailed(format!("{} failed: {}", stage, error)))
    }
}

#[async_trait]
impl FeatureExtractor for RemoteExtractor {
    async fn detect_faces(&self, frame: &Frame) -> VisionResult<Vec<FaceDetection>> {
        let frame_data = STANDARD.encode(&frame.image);
        let request_id = request_id(frame);
        let url = format!("{}/detect", self.config.face_detection_url);

        let response: DetectFacesResponse = self
            .post_json(
                &url,
                &DetectFacesRequest {
                    frame_data: &frame_data,
                    request_id: &request_id,
                    confidence_threshold: self.config.detection_confidence,
                },
            )
            .await?;
        check_success(response.success, response.error, "face detection")?;

        Ok(response.faces.into_iter().map(FaceDetection::from).collect())
    }

    async fn extract_landmarks(
        &self,
        frame: &Frame,
        face: &TrackedFace,
    ) -> VisionResult<FaceLandmarks> {
        let frame_data = STANDARD.encode(&frame.image);
        let request_id = request_id(frame);
        let url = format!("{}/detect", self.config.landmark_detection_url);

        let response: LandmarksResponse = self
            .post_json(
                &url,
                &LandmarksRequest {
                    frame_data: &frame_data,
                    faces: vec![WireFace::from_bbox(&face.bbox, face.confidence)],
                    request_id: &request_id,
                },
            )
            .await?;
        check_success(response.success, response.error, "landmark detection")?;

        let points = response
            .faces
            .into_iter()
            .next()
            .map(|f| f.landmarks)
            .unwrap_or_default();
        if points.is_empty() {
            return Err(VisionError::missing_landmarks(format!(
                "no landmarks for track {}",
                face.track_id
            )));
        }

        Ok(FaceLandmarks::new(points))
    }

    async fn estimate_head_pose(&self, landmarks: &FaceLandmarks) -> VisionResult<HeadPose> {
        let url = format!("{}/estimate", self.config.head_pose_url);
        let response: HeadPoseResponse = self
            .post_json(
                &url,
                &LandmarkPayload {
                    landmarks: &landmarks.points,
                    request_id: "",
                    track_id: None,
                },
            )
            .await?;
        check_success(response.success, response.error, "head pose")?;

        Ok(HeadPose::new(response.yaw, response.pitch, response.roll))
    }

    async fn estimate_gaze(&self, landmarks: &FaceLandmarks) -> VisionResult<Gaze> {
        let url = format!("{}/track", self.config.gaze_tracking_url);
        let response: GazeResponse = self
            .post_json(
                &url,
                &LandmarkPayload {
                    landmarks: &landmarks.points,
                    request_id: "",
                    track_id: None,
                },
            )
            .await?;
        check_success(response.success, response.error, "gaze tracking")?;

        let gaze = Gaze::new(response.gaze_x, response.gaze_y);
        Ok(match response.is_looking_at_camera {
            Some(looking_at_camera) => Gaze {
                looking_at_camera,
                ..gaze
            },
            None => gaze,
        })
    }

    async fn estimate_blink(
        &self,
        landmarks: &FaceLandmarks,
        track_id: TrackId,
    ) -> VisionResult<f64> {
        let url = format!("{}/detect", self.config.blink_detection_url);
        let response: BlinkResponse = self
            .post_json(
                &url,
                &LandmarkPayload {
                    landmarks: &landmarks.points,
                    request_id: "",
                    track_id: Some(track_id.to_string()),
                },
            )
            .await?;
        check_success(response.success, response.error, "blink detection")?;

        Ok(response.avg_ear)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
