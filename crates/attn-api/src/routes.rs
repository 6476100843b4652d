//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{health, submit_frame};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;
use crate::ws::ws_meeting;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new().route("/meetings/:meeting_id/frames", post(submit_frame));

    let ws_routes = Router::new().route("/ws/meetings/:meeting_id", get(ws_meeting));

    let health_routes = Router::new().route("/health", get(health));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let max_body_size = state.config.max_body_size;

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use attn_hub::{DistributionHub, PersisterConfig, SampledPersister, TracingSampleSink};
    use attn_models::{FaceDetection, FaceLandmarks, Frame, Gaze, HeadPose, TrackId, TrackedFace};
    use attn_vision::{FeatureExtractor, VisionError, VisionResult};
    use attn_worker::{PipelineConfig, PipelineWorkerPool};

    use super::*;
    use crate::config::ApiConfig;
    use crate::handlers::frames::SubmitFrameResponse;

    /// Sees nobody in any frame.
    struct EmptyRoomExtractor;

    #[async_trait]
    impl FeatureExtractor for EmptyRoomExtractor {
        async fn detect_faces(&self, _frame: &Frame) -> VisionResult<Vec<FaceDetection>> {
            Ok(Vec::new())
        }

        async fn extract_landmarks(
            &self,
            _frame: &Frame,
            _face: &TrackedFace,
        ) -> VisionResult<FaceLandmarks> {
            Err(VisionError::missing_landmarks("no faces"))
        }

        async fn estimate_head_pose(&self, _landmarks: &FaceLandmarks) -> VisionResult<HeadPose> {
            Err(VisionError::missing_landmarks("no faces"))
        }

        async fn estimate_gaze(&self, _landmarks: &FaceLandmarks) -> VisionResult<Gaze> {
            Err(VisionError::missing_landmarks("no faces"))
        }

        async fn estimate_blink(
            &self,
            _landmarks: &FaceLandmarks,
            _track_id: TrackId,
        ) -> VisionResult<f64> {
            Err(VisionError::missing_landmarks("no faces"))
        }

        fn name(&self) -> &'static str {
            "empty-room"
        }
    }

    fn test_state() -> AppState {
        let hub = Arc::new(DistributionHub::default());
        let pool = PipelineWorkerPool::start(
            PipelineConfig {
                workers: 1,
                queue_capacity: 4,
                ..Default::default()
            },
            Arc::new(EmptyRoomExtractor),
            hub.clone(),
            None,
        )
        .unwrap();
        AppState::new(ApiConfig::default(), Arc::new(pool), hub)
    }

    fn post_frame(meeting: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/meetings/{}/frames", meeting))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_accepted(response: axum::response::Response) -> SubmitFrameResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_frame_accepted() {
        let app = create_router(test_state(), None);

        let response = app
            .oneshot(post_frame("m1", r#"{"frameData":"AQID","timestampMs":1000}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            read_accepted(response).await,
            SubmitFrameResponse { accepted: true }
        );
    }

    #[tokio::test]
    async fn test_malformed_payloads_rejected() {
        let state = test_state();

        for body in [r#"{"frameData":"%%%"}"#, r#"{"timestampMs":1}"#, "not json"] {
            let response = create_router(state.clone(), None)
                .oneshot(post_frame("m1", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        }

        let response = create_router(state, None)
            .oneshot(post_frame("bad%20id", r#"{"frameData":"AQID"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_draining_pool_returns_503() {
        let state = test_state();
        state.pool.shutdown().await.unwrap();

        let response = create_router(state, None)
            .oneshot(post_frame("m1", r#"{"frameData":"AQID"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            read_accepted(response).await,
            SubmitFrameResponse { accepted: false }
        );
    }

    #[tokio::test]
    async fn test_health_and_disabled_metrics() {
        let state = test_state();

        let response = create_router(state.clone(), None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["acceptingFrames"], true);
        assert_eq!(body["workers"], 1);
        assert!(body["persisting"].is_null());

        let response = create_router(state, None)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_persister() {
        let (persister, writer) =
            SampledPersister::start(PersisterConfig::default(), Arc::new(TracingSampleSink));
        let state = test_state().with_persister(Arc::new(persister));

        let response = create_router(state.clone(), None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["persisting"], true);

        writer.abort();
        let _ = writer.await;

        let response = create_router(state, None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["persisting"], false);
    }
}
