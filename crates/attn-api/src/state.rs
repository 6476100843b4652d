//! Application state.

use std::sync::Arc;

use attn_hub::{DistributionHub, SampledPersister};
use attn_worker::PipelineWorkerPool;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pool: Arc<PipelineWorkerPool>,
    pub hub: Arc<DistributionHub>,
    /// Absent when sampling is disabled
    pub persister: Option<Arc<SampledPersister>>,
}

impl AppState {
    pub fn new(config: ApiConfig, pool: Arc<PipelineWorkerPool>, hub: Arc<DistributionHub>) -> Self {
        Self {
            config,
            pool,
            hub,
            persister: None,
        }
    }

    pub fn with_persister(mut self, persister: Arc<SampledPersister>) -> Self {
        self.persister = Some(persister);
        self
    }
}
