//! Real-time distribution of attention results.
//!
//! `DistributionHub` fans result batches and alerts out to the live
//! subscribers of each meeting. `SampledPersister` stores a throttled copy.

pub mod error;
pub mod hub;
pub mod metrics;
pub mod persist;

pub use error::{HubError, HubResult};
pub use hub::{BroadcastReport, DistributionHub, HubConfig, Outbound, Subscriber};
pub use persist::{
    AttentionSample, PersisterConfig, RedisSampleSink, SampleSink, SampledPersister,
    TracingSampleSink,
};
