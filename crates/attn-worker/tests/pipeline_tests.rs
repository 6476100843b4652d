//! End-to-end tests for the worker pool with a scripted extractor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use attn_hub::{
    AttentionSample, DistributionHub, HubResult, Outbound, PersisterConfig, SampleSink,
    SampledPersister,
};
use attn_models::{
    AlertType, BoundingBox, FaceDetection, FaceLandmarks, Frame, Gaze, HeadPose, Landmark,
    MeetingId, SubscriberId, TrackId, TrackedFace, WsMessage,
};
use attn_vision::{FeatureExtractor, VisionError, VisionResult};
use attn_worker::{PipelineConfig, PipelineWorkerPool, WorkerError};

struct ScriptedExtractor {
    faces: Vec<FaceDetection>,
    head_pose: HeadPose,
    gaze: Gaze,
    ear: f64,
    fail_landmarks: bool,
    /// When set, detection waits for a permit
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedExtractor {
    fn attentive() -> Self {
        Self {
            faces: vec![FaceDetection::new(BoundingBox::new(100.0, 100.0, 80.0, 80.0), 0.95)],
            head_pose: HeadPose::new(0.0, 0.0, 0.0),
            gaze: Gaze::new(0.0, 0.0),
            ear: 0.3,
            fail_landmarks: false,
            gate: None,
        }
    }
}

#[async_trait]
impl FeatureExtractor for ScriptedExtractor {
    async fn detect_faces(&self, _frame: &Frame) -> VisionResult<Vec<FaceDetection>> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| VisionError::ServiceUnavailable("gate closed".into()))?
                .forget();
        }
        Ok(self.faces.clone())
    }

    async fn extract_landmarks(
        &self,
        _frame: &Frame,
        _face: &TrackedFace,
    ) -> VisionResult<FaceLandmarks> {
        if self.fail_landmarks {
            return Err(VisionError::missing_landmarks("scripted failure"));
        }
        Ok(FaceLandmarks::new(vec![Landmark::new(0.5, 0.5); 478]))
    }

    async fn estimate_head_pose(&self, _landmarks: &FaceLandmarks) -> VisionResult<HeadPose> {
        Ok(self.head_pose)
    }

    async fn estimate_gaze(&self, _landmarks: &FaceLandmarks) -> VisionResult<Gaze> {
        Ok(self.gaze)
    }

    async fn estimate_blink(
        &self,
        _landmarks: &FaceLandmarks,
        _track_id: TrackId,
    ) -> VisionResult<f64> {
        Ok(self.ear)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn config(workers: usize, queue_capacity: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        queue_capacity,
        shutdown_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

#[derive(Default)]
struct RecordingSink {
    samples: Mutex<Vec<AttentionSample>>,
}

#[async_trait]
impl SampleSink for RecordingSink {
    async fn record_sample(&self, sample: &AttentionSample) -> HubResult<()> {
        self.samples.lock().unwrap().push(sample.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

async fn next(rx: &mut mpsc::Receiver<Outbound>) -> Outbound {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for hub message")
        .expect("hub channel closed")
}

#[tokio::test]
async fn test_frame_produces_update_and_alert() {
    let hub = Arc::new(DistributionHub::default());
    let mut rx = hub.subscribe(MeetingId::from("m"), SubscriberId::from("viewer"));

    let extractor = ScriptedExtractor {
        head_pose: HeadPose::new(40.0, 5.0, 0.0),
        gaze: Gaze::new(0.05, 0.02),
        ear: 0.28,
        ..ScriptedExtractor::attentive()
    };
    let pool =
        PipelineWorkerPool::start(config(2, 8), Arc::new(extractor), hub.clone(), None).unwrap();

    assert!(pool.submit_frame(MeetingId::from("m"), vec![1, 2, 3], 1_000));

    match next(&mut rx).await.as_ref() {
        WsMessage::AttentionUpdate { meeting_id, faces } => {
            assert_eq!(meeting_id.as_str(), "m");
            assert_eq!(faces.len(), 1);
            assert_eq!(faces[0].track_id, TrackId(1));
            assert_eq!(faces[0].attention_score, 73);
            assert_eq!(faces[0].head_pose_score, 32.0);
            assert_eq!(faces[0].eye_openness_score, 100.0);
            assert!(faces[0].is_looking_away);
            assert!(!faces[0].is_drowsy);
            assert_eq!(faces[0].blink_rate, Some(0.0));
        }
        other => panic!("expected attention_update, got {:?}", other),
    }

    match next(&mut rx).await.as_ref() {
        WsMessage::Alert {
            participant_id,
            alert_type,
            ..
        } => {
            assert_eq!(participant_id, "track-1");
            assert_eq!(*alert_type, AlertType::LookingAway);
        }
        other => panic!("expected alert, got {:?}", other),
    }

    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_landmark_failure_degrades_to_presence_only() {
    let hub = Arc::new(DistributionHub::default());
    let mut rx = hub.subscribe(MeetingId::from("m"), SubscriberId::from("viewer"));

    let extractor = ScriptedExtractor {
        fail_landmarks: true,
        ..ScriptedExtractor::attentive()
    };
    let pool =
        PipelineWorkerPool::start(config(1, 8), Arc::new(extractor), hub.clone(), None).unwrap();

    assert!(pool.submit_frame(MeetingId::from("m"), vec![0], 0));

    match next(&mut rx).await.as_ref() {
        WsMessage::AttentionUpdate { faces, .. } => {
            assert_eq!(faces.len(), 1);
            assert_eq!(faces[0].attention_score, 15);
            assert!(!faces[0].is_looking_away);
        }
        other => panic!("expected attention_update, got {:?}", other),
    }

    match next(&mut rx).await.as_ref() {
        WsMessage::Alert { alert_type, .. } => assert_eq!(*alert_type, AlertType::NotAttentive),
        other => panic!("expected alert, got {:?}", other),
    }

    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_full_queue_drops_without_blocking() {
    let hub = Arc::new(DistributionHub::default());
    let gate = Arc::new(Semaphore::new(0));
    let extractor = ScriptedExtractor {
        gate: Some(gate.clone()),
        ..ScriptedExtractor::attentive()
    };
    let pool =
        PipelineWorkerPool::start(config(1, 1), Arc::new(extractor), hub.clone(), None).unwrap();

    let accepted: Vec<bool> = (0..4)
        .map(|i| pool.submit_frame(MeetingId::from("m"), vec![0], i))
        .collect();

    assert!(accepted[0]);
    assert!(accepted.iter().any(|ok| !ok));

    // Release the stalled worker so shutdown can drain
    gate.close();
    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_track_ids_are_scoped_per_meeting() {
    let hub = Arc::new(DistributionHub::default());
    let mut rx_a = hub.subscribe(MeetingId::from("a"), SubscriberId::from("va"));
    let mut rx_b = hub.subscribe(MeetingId::from("b"), SubscriberId::from("vb"));

    let pool = PipelineWorkerPool::start(
        config(2, 8),
        Arc::new(ScriptedExtractor::attentive()),
        hub.clone(),
        None,
    )
    .unwrap();

    assert!(pool.submit_frame(MeetingId::from("a"), vec![0], 0));
    assert!(pool.submit_frame(MeetingId::from("b"), vec![0], 0));

    for rx in [&mut rx_a, &mut rx_b] {
        match next(rx).await.as_ref() {
            WsMessage::AttentionUpdate { faces, .. } => {
                assert_eq!(faces[0].track_id, TrackId(1));
                assert_eq!(faces[0].attention_score, 100);
            }
            other => panic!("expected attention_update, got {:?}", other),
        }
    }

    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_intake() {
    let hub = Arc::new(DistributionHub::default());
    let pool = PipelineWorkerPool::start(
        config(2, 4),
        Arc::new(ScriptedExtractor::attentive()),
        hub,
        None,
    )
    .unwrap();

    assert!(pool.is_accepting());
    pool.shutdown().await.unwrap();

    assert!(!pool.is_accepting());
    assert!(!pool.submit_frame(MeetingId::from("m"), vec![0], 0));
    assert!(matches!(pool.shutdown().await, Err(WorkerError::ShuttingDown)));
}

#[tokio::test]
async fn test_extreme_timestamps_do_not_kill_worker() {
    let hub = Arc::new(DistributionHub::default());
    let mut rx = hub.subscribe(MeetingId::from("m"), SubscriberId::from("viewer"));

    let extractor = ScriptedExtractor {
        fail_landmarks: true,
        ..ScriptedExtractor::attentive()
    };
    let pool =
        PipelineWorkerPool::start(config(1, 8), Arc::new(extractor), hub.clone(), None).unwrap();

    // Both extremes fire: the saturated gap exceeds the cooldown
    for ts in [i64::MIN, i64::MAX] {
        assert!(pool.submit_frame(MeetingId::from("m"), vec![0], ts));
        assert!(matches!(
            next(&mut rx).await.as_ref(),
            WsMessage::AttentionUpdate { .. }
        ));
        match next(&mut rx).await.as_ref() {
            WsMessage::Alert { alert_type, .. } => {
                assert_eq!(*alert_type, AlertType::NotAttentive)
            }
            other => panic!("expected alert, got {:?}", other),
        }
    }

    // The shard is still alive and keeps scoring the meeting
    assert!(pool.submit_frame(MeetingId::from("m"), vec![0], 1_000));
    match next(&mut rx).await.as_ref() {
        WsMessage::AttentionUpdate { faces, .. } => assert_eq!(faces[0].attention_score, 15),
        other => panic!("expected attention_update, got {:?}", other),
    }

    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_persister_samples_at_interval() {
    let hub = Arc::new(DistributionHub::default());
    let mut rx = hub.subscribe(MeetingId::from("m"), SubscriberId::from("viewer"));

    let sink = Arc::new(RecordingSink::default());
    let (persister, writer) = SampledPersister::start(PersisterConfig::default(), sink.clone());
    let persister = Arc::new(persister);

    let pool = PipelineWorkerPool::start(
        config(1, 8),
        Arc::new(ScriptedExtractor::attentive()),
        hub.clone(),
        Some(Arc::clone(&persister)),
    )
    .unwrap();

    // 1_000 falls inside the 5s gate opened by the first frame
    for ts in [0, 1_000, 6_000] {
        assert!(pool.submit_frame(MeetingId::from("m"), vec![0], ts));
        assert!(matches!(
            next(&mut rx).await.as_ref(),
            WsMessage::AttentionUpdate { .. }
        ));
    }

    pool.shutdown().await.unwrap();
    drop(persister);
    tokio::time::timeout(Duration::from_secs(5), writer)
        .await
        .expect("sample writer did not stop")
        .unwrap();

    let samples = sink.samples.lock().unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.participant_id == "track-1"));
    assert_eq!(samples[0].timestamp.timestamp_millis(), 0);
    assert_eq!(samples[1].timestamp.timestamp_millis(), 6_000);
    assert_eq!(samples[0].attention_score, 1.0);
}
