//! Attention pipeline worker pool.
//!
//! Frames enter through `PipelineWorkerPool::submit`, are processed by a
//! fixed set of workers, and every result batch is published to the
//! distribution hub and offered to sampled persistence.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod processor;
pub mod session;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::MeetingLogger;
pub use pool::PipelineWorkerPool;
pub use processor::FrameProcessor;
pub use session::MeetingSession;
