//! Fixed-size worker pool with bounded, non-blocking intake.
//!
//! Intake is sharded: each worker owns one bounded queue and a meeting is
//! always routed to the same shard. Per-meeting state therefore lives in
//! exactly one task and frames of a meeting are processed in order.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use attn_hub::{DistributionHub, SampledPersister};
use attn_models::{Frame, MeetingId};
use attn_vision::FeatureExtractor;

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::processor::FrameProcessor;
use crate::session::MeetingSession;

/// Everything a worker task needs besides its own queue and sessions.
struct WorkerContext {
    config: PipelineConfig,
    processor: FrameProcessor,
    hub: Arc<DistributionHub>,
    persister: Option<Arc<SampledPersister>>,
}

/// Bounded pool of pipeline workers.
pub struct PipelineWorkerPool {
    /// Intake senders, one per worker; emptied on shutdown
    shards: RwLock<Vec<mpsc::Sender<Frame>>>,
    workers: usize,
    queue_capacity: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_timeout: std::time::Duration,
}

impl PipelineWorkerPool {
    /// Spawn the workers.
    pub fn start(
        config: PipelineConfig,
        extractor: Arc<dyn FeatureExtractor>,
        hub: Arc<DistributionHub>,
        persister: Option<Arc<SampledPersister>>,
    ) -> WorkerResult<Self> {
        config.validate()?;

        let workers = config.workers;
        let queue_capacity = config.queue_capacity;
        let shutdown_timeout = config.shutdown_timeout;

        info!(
            workers,
            queue_capacity,
            extractor = extractor.name(),
            "Starting pipeline worker pool"
        );

        let ctx = Arc::new(WorkerContext {
            processor: FrameProcessor::new(extractor, &config),
            config,
            hub,
            persister,
        });

        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let (tx, rx) = mpsc::channel(queue_capacity);
            shards.push(tx);
            handles.push(tokio::spawn(run_worker(index, rx, Arc::clone(&ctx))));
        }

        Ok(Self {
            shards: RwLock::new(shards),
            workers,
            queue_capacity,
            handles: Mutex::new(handles),
            shutdown_timeout,
        })
    }

    /// Queue a frame. Never waits: returns false and drops the frame when
    /// its shard is full or the pool is shutting down.
    pub fn submit(&self, frame: Frame) -> bool {
        metrics::record_frame_submitted();

        let shards = self.shards.read().unwrap_or_else(PoisonError::into_inner);
        if shards.is_empty() {
            metrics::record_frame_dropped("shutdown");
            return false;
        }

        let shard = shard_for(&frame.meeting_id, shards.len());
        match shards[shard].try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                metrics::record_frame_dropped("queue_full");
                debug!(
                    meeting_id = %frame.meeting_id,
                    shard,
                    timestamp_ms = frame.timestamp_ms,
                    "Intake queue full, frame dropped"
                );
                false
            }
            Err(TrySendError::Closed(frame)) => {
                metrics::record_frame_dropped("worker_stopped");
                warn!(meeting_id = %frame.meeting_id, shard, "Worker stopped, frame dropped");
                false
            }
        }
    }

    /// Convenience wrapper around [`submit`](Self::submit).
    pub fn submit_frame(&self, meeting_id: MeetingId, image: Vec<u8>, timestamp_ms: i64) -> bool {
        self.submit(Frame::new(meeting_id, image, timestamp_ms))
    }

    /// Frames waiting across all shards.
    pub fn pending_frames(&self) -> usize {
        let shards = self.shards.read().unwrap_or_else(PoisonError::into_inner);
        shards
            .iter()
            .map(|tx| self.queue_capacity - tx.capacity())
            .sum()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_accepting(&self) -> bool {
        !self
            .shards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Close intake and wait for queued and in-flight frames to finish.
    pub async fn shutdown(&self) -> WorkerResult<()> {
        let closed = std::mem::take(
            &mut *self.shards.write().unwrap_or_else(PoisonError::into_inner),
        );
        if closed.is_empty() {
            return Err(WorkerError::ShuttingDown);
        }
        drop(closed);

        info!("Waiting for pipeline workers to drain...");
        let handles = std::mem::take(&mut *self.handles.lock().await);
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Pipeline worker ended abnormally");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Pipeline workers did not drain before timeout"
            );
        }
        info!("Pipeline worker pool stopped");
        Ok(())
    }
}

fn shard_for(meeting_id: &MeetingId, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    meeting_id.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

async fn run_worker(index: usize, mut rx: mpsc::Receiver<Frame>, ctx: Arc<WorkerContext>) {
    let mut sessions: HashMap<MeetingId, MeetingSession> = HashMap::new();
    let mut eviction = tokio::time::interval(ctx.config.eviction_interval);

    debug!(worker = index, "Pipeline worker started");

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };

                let session = sessions.entry(frame.meeting_id.clone()).or_insert_with(|| {
                    let session = MeetingSession::new(frame.meeting_id.clone(), index, &ctx.config);
                    session.logger.log_session_started();
                    session
                });
                let is_new = session.frames() == 0;

                let batch = ctx.processor.process(session, &frame).await;
                let report = ctx.hub.publish_batch(&batch);
                if let Some(persister) = &ctx.persister {
                    persister.offer(&batch);
                }
                session.logger.log_batch(&batch, report.delivered);

                if is_new {
                    metrics::set_active_sessions(index, sessions.len());
                }
            }
            _ = eviction.tick() => {
                evict_idle(index, &mut sessions, &ctx);
            }
        }
    }

    debug!(worker = index, sessions = sessions.len(), "Pipeline worker stopped");
}

fn evict_idle(index: usize, sessions: &mut HashMap<MeetingId, MeetingSession>, ctx: &WorkerContext) {
    let timeout = ctx.config.session_idle_timeout;
    let before = sessions.len();

    sessions.retain(|meeting_id, session| {
        if session.is_idle(timeout) {
            session
                .logger
                .log_session_evicted(session.frames(), &session.tracker.stats());
            if let Some(persister) = &ctx.persister {
                persister.forget(meeting_id);
            }
            false
        } else {
            true
        }
    });

    if sessions.len() != before {
        metrics::set_active_sessions(index, sessions.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_routing_is_stable() {
        let meeting = MeetingId::from("m-42");
        let first = shard_for(&meeting, 8);
        for _ in 0..10 {
            assert_eq!(shard_for(&meeting, 8), first);
        }
        assert!(first < 8);
        assert_eq!(shard_for(&meeting, 1), 0);
    }
}
