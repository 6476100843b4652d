//! Throttled persistence of attention samples.
//!
//! Each meeting is sampled at most once per interval, measured on frame
//! capture time. Sampled rows are handed to a background writer through a
//! bounded queue so a slow store never stalls the pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use attn_models::{FaceResult, MeetingId, ParticipantKey, ResultBatch};

use crate::error::{HubError, HubResult};
use crate::metrics;

/// One persisted attention row. Scores are on the 0-1 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionSample {
    pub meeting_id: MeetingId,
    pub participant_id: String,
    pub attention_score: f64,
    pub gaze_score: f64,
    pub head_pose_score: f64,
    pub eye_openness_score: f64,
    pub is_looking_away: bool,
    pub is_drowsy: bool,
    pub timestamp: DateTime<Utc>,
}

impl AttentionSample {
    pub fn from_face(meeting_id: &MeetingId, face: &FaceResult, timestamp: DateTime<Utc>) -> Self {
        let key = ParticipantKey::new(meeting_id.clone(), face.face.track_id);
        let sub = &face.score.sub_scores;
        Self {
            meeting_id: meeting_id.clone(),
            participant_id: key.participant_id(),
            attention_score: f64::from(face.score.value) / 100.0,
            gaze_score: sub.gaze,
            head_pose_score: sub.head_pose,
            eye_openness_score: sub.eye_openness,
            is_looking_away: face.is_looking_away,
            is_drowsy: face.features.is_drowsy,
            timestamp,
        }
    }
}

/// Durable destination for sampled rows.
#[async_trait]
pub trait SampleSink: Send + Sync {
    async fn record_sample(&self, sample: &AttentionSample) -> HubResult<()>;

    /// Sink name for logging.
    fn name(&self) -> &'static str;
}

/// Appends samples to a per-meeting Redis stream.
pub struct RedisSampleSink {
    client: redis::Client,
    /// Approximate cap on entries kept per stream
    max_len: usize,
}

impl RedisSampleSink {
    pub fn new(redis_url: &str, max_len: usize) -> HubResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, max_len })
    }

    /// Stream key for a meeting.
    pub fn stream_name(meeting_id: &MeetingId) -> String {
        format!("attention:samples:{}", meeting_id)
    }
}

#[async_trait]
impl SampleSink for RedisSampleSink {
    async fn record_sample(&self, sample: &AttentionSample) -> HubResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(sample)?;

        redis::cmd("XADD")
            .arg(Self::stream_name(&sample.meeting_id))
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_len)
            .arg("*")
            .arg("participant")
            .arg(&sample.participant_id)
            .arg("sample")
            .arg(&payload)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Log-only sink used when no store is configured.
pub struct TracingSampleSink;

#[async_trait]
impl SampleSink for TracingSampleSink {
    async fn record_sample(&self, sample: &AttentionSample) -> HubResult<()> {
        info!(
            meeting_id = %sample.meeting_id,
            participant_id = %sample.participant_id,
            attention_score = sample.attention_score,
            is_looking_away = sample.is_looking_away,
            is_drowsy = sample.is_drowsy,
            "Attention sample"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Persister configuration.
#[derive(Debug, Clone)]
pub struct PersisterConfig {
    /// Minimum capture-time gap between samples of one meeting
    pub interval_ms: i64,
    /// Pending batches buffered for the writer
    pub queue_capacity: usize,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            queue_capacity: 256,
        }
    }
}

impl PersisterConfig {
    pub fn from_env() -> Self {
        Self {
            interval_ms: std::env::var("PERSIST_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5_000),
            queue_capacity: std::env::var("PERSIST_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(256),
        }
    }
}

/// Throttle gate in front of a background sample writer.
pub struct SampledPersister {
    config: PersisterConfig,
    last_saved: Mutex<HashMap<MeetingId, i64>>,
    tx: mpsc::Sender<Vec<AttentionSample>>,
}

impl SampledPersister {
    /// Start the background writer for `sink`.
    ///
    /// The writer exits once every handle to the persister is dropped and
    /// the queue has drained.
    pub fn start(config: PersisterConfig, sink: Arc<dyn SampleSink>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let handle = tokio::spawn(run_writer(rx, sink));

        let persister = Self {
            config,
            last_saved: Mutex::new(HashMap::new()),
            tx,
        };
        (persister, handle)
    }

    /// Offer a batch. Returns true if it passed the gate and was queued.
    pub fn offer(&self, batch: &ResultBatch) -> bool {
        if batch.is_empty() {
            return false;
        }

        let mut last_saved = self.last_saved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&last) = last_saved.get(&batch.meeting_id) {
            if batch.frame_timestamp_ms.saturating_sub(last) < self.config.interval_ms {
                return false;
            }
        }

        let timestamp =
            DateTime::<Utc>::from_timestamp_millis(batch.frame_timestamp_ms).unwrap_or_else(Utc::now);
        let samples: Vec<AttentionSample> = batch
            .faces
            .iter()
            .map(|face| AttentionSample::from_face(&batch.meeting_id, face, timestamp))
            .collect();
        let count = samples.len();

        match self.tx.try_send(samples) {
            Ok(()) => {
                last_saved.insert(batch.meeting_id.clone(), batch.frame_timestamp_ms);
                metrics::record_samples_queued(count);
                true
            }
            Err(TrySendError::Full(_)) => {
                metrics::record_samples_dropped(count);
                warn!(
                    meeting_id = %batch.meeting_id,
                    samples = count,
                    "Sample queue full, dropping"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                metrics::record_samples_dropped(count);
                warn!(meeting_id = %batch.meeting_id, "Sample writer stopped, dropping");
                false
            }
        }
    }

    /// Drop gate state for a meeting that is no longer processed.
    pub fn forget(&self, meeting_id: &MeetingId) {
        self.last_saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(meeting_id);
    }

    /// Whether the writer is still accepting batches.
    pub fn ensure_running(&self) -> HubResult<()> {
        if self.tx.is_closed() {
            Err(HubError::Closed)
        } else {
            Ok(())
        }
    }
}

async fn run_writer(mut rx: mpsc::Receiver<Vec<AttentionSample>>, sink: Arc<dyn SampleSink>) {
    info!(sink = sink.name(), "Sample writer started");

    while let Some(samples) = rx.recv().await {
        for sample in &samples {
            match sink.record_sample(sample).await {
                Ok(()) => metrics::record_sample_written(sink.name()),
                Err(e) => {
                    metrics::record_sample_failed(sink.name());
                    warn!(
                        sink = sink.name(),
                        meeting_id = %sample.meeting_id,
                        participant_id = %sample.participant_id,
                        error = %e,
                        "Failed to persist sample"
                    );
                }
            }
        }
        debug!(sink = sink.name(), samples = samples.len(), "Sample batch written");
    }

    info!(sink = sink.name(), "Sample writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use attn_models::{
        AttentionScore, BoundingBox, FeatureRecord, SubScores, TrackId, TrackedFace,
    };

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

    fn face(track: u32, value: u8) -> FaceResult {
        FaceResult {
            face: TrackedFace {
                track_id: TrackId(track),
                bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                confidence: 0.9,
            },
            features: FeatureRecord::present_only(),
            score: AttentionScore {
                track_id: TrackId(track),
                value,
                sub_scores: SubScores {
                    gaze: 0.5,
                    head_pose: 0.25,
                    eye_openness: 1.0,
                    presence: 1.0,
                },
                computed_at: Utc::now(),
            },
            is_looking_away: false,
        }
    }

    fn batch(meeting: &str, ts: i64, faces: Vec<FaceResult>) -> ResultBatch {
        ResultBatch {
            meeting_id: MeetingId::from(meeting),
            frame_timestamp_ms: ts,
            faces,
            alerts: vec![],
            processing_time_ms: 1.0,
        }
    }

    #[tokio::test]
    async fn test_gate_samples_once_per_interval() {
        let sink = Arc::new(RecordingSink::default());
        let (persister, handle) = SampledPersister::start(PersisterConfig::default(), sink.clone());

        assert!(persister.offer(&batch("m", 0, vec![face(1, 80), face(2, 40)])));
        assert!(!persister.offer(&batch("m", 3_000, vec![face(1, 80)])));
        assert!(persister.offer(&batch("other", 3_000, vec![face(1, 80)])));
        assert!(persister.offer(&batch("m", 5_000, vec![face(1, 70)])));

        drop(persister);
        handle.await.unwrap();

        let samples = sink.samples.lock().unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].participant_id, "track-1");
        assert_eq!(samples[0].attention_score, 0.8);
        assert_eq!(samples[0].head_pose_score, 0.25);
        assert_eq!(samples[0].timestamp.timestamp_millis(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_does_not_consume_window() {
        let sink = Arc::new(RecordingSink::default());
        let (persister, _handle) = SampledPersister::start(PersisterConfig::default(), sink);

        assert!(!persister.offer(&batch("m", 0, vec![])));
        assert!(persister.offer(&batch("m", 100, vec![face(1, 50)])));
    }

    #[tokio::test]
    async fn test_forget_reopens_gate() {
        let sink = Arc::new(RecordingSink::default());
        let (persister, _handle) = SampledPersister::start(PersisterConfig::default(), sink);

        assert!(persister.offer(&batch("m", 0, vec![face(1, 50)])));
        persister.forget(&MeetingId::from("m"));
        assert!(persister.offer(&batch("m", 10, vec![face(1, 50)])));
        assert!(persister.ensure_running().is_ok());
    }

    #[tokio::test]
    async fn test_gate_handles_extreme_timestamps() {
        let sink = Arc::new(RecordingSink::default());
        let (persister, _handle) = SampledPersister::start(PersisterConfig::default(), sink);

        assert!(persister.offer(&batch("m", i64::MIN, vec![face(1, 50)])));
        assert!(persister.offer(&batch("m", i64::MAX, vec![face(1, 50)])));
        assert!(!persister.offer(&batch("m", i64::MIN, vec![face(1, 50)])));
    }

    #[test]
    fn test_stream_name() {
        assert_eq!(
            RedisSampleSink::stream_name(&MeetingId::from("abc")),
            "attention:samples:abc"
        );
    }
}
