//! Per-meeting subscriber registry and broadcast.
//!
//! All membership changes and broadcast snapshots go through one mutex that
//! only ever guards map access. Sends happen after the lock is released and
//! never wait: a subscriber whose channel is full misses that message and
//! nobody else is affected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

use attn_models::{MeetingId, ResultBatch, SubscriberId, WsMessage};

use crate::metrics;

/// Messages are shared between every subscriber of a room.
pub type Outbound = Arc<WsMessage>;

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound channel capacity per subscriber
    pub subscriber_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Self {
        Self {
            subscriber_buffer: std::env::var("HUB_SUBSCRIBER_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(64),
        }
    }
}

/// A live subscriber: identity plus the sending half of its outbound channel.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub meeting_id: MeetingId,
    sender: mpsc::Sender<Outbound>,
}

impl Subscriber {
    pub fn new(id: SubscriberId, meeting_id: MeetingId, sender: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            meeting_id,
            sender,
        }
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the message
    pub delivered: usize,
    /// Subscribers whose channel was full
    pub dropped: usize,
    /// Subscribers whose receiver was gone; they are removed
    pub closed: usize,
}

impl BroadcastReport {
    fn merge(&mut self, other: BroadcastReport) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.closed += other.closed;
    }
}

#[derive(Default)]
struct Registry {
    rooms: HashMap<MeetingId, HashMap<SubscriberId, mpsc::Sender<Outbound>>>,
    /// Which room each subscriber is in
    index: HashMap<SubscriberId, MeetingId>,
}

impl Registry {
    fn remove(&mut self, subscriber_id: &SubscriberId) -> Option<MeetingId> {
        let meeting_id = self.index.remove(subscriber_id)?;
        if let Some(room) = self.rooms.get_mut(&meeting_id) {
            room.remove(subscriber_id);
            if room.is_empty() {
                self.rooms.remove(&meeting_id);
            }
        }
        Some(meeting_id)
    }

    fn subscriber_total(&self) -> usize {
        self.index.len()
    }
}

/// Fan-out hub for attention results.
pub struct DistributionHub {
    config: HubConfig,
    registry: Mutex<Registry>,
}

impl DistributionHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(Registry::default()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // Registry maps stay consistent even if a holder panicked
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscriber, creating its room on first use. A subscriber id that
    /// is already registered is moved over and its previous channel closed.
    pub fn register(&self, subscriber: Subscriber) {
        let (subscribers, rooms) = {
            let mut registry = self.registry();
            registry.remove(&subscriber.id);
            registry
                .index
                .insert(subscriber.id.clone(), subscriber.meeting_id.clone());
            registry
                .rooms
                .entry(subscriber.meeting_id.clone())
                .or_default()
                .insert(subscriber.id.clone(), subscriber.sender);
            (registry.subscriber_total(), registry.rooms.len())
        };

        metrics::set_active(subscribers, rooms);
        debug!(
            meeting_id = %subscriber.meeting_id,
            subscriber_id = %subscriber.id,
            "Subscriber registered"
        );
    }

    /// Remove a subscriber, deleting its room when it becomes empty.
    /// Returns the meeting the subscriber belonged to.
    pub fn unregister(&self, subscriber_id: &SubscriberId) -> Option<MeetingId> {
        let (meeting_id, subscribers, rooms) = {
            let mut registry = self.registry();
            let meeting_id = registry.remove(subscriber_id);
            (meeting_id, registry.subscriber_total(), registry.rooms.len())
        };

        if let Some(meeting_id) = &meeting_id {
            metrics::set_active(subscribers, rooms);
            debug!(meeting_id = %meeting_id, subscriber_id = %subscriber_id, "Subscriber unregistered");
        }
        meeting_id
    }

    /// Register a new subscriber with a bounded channel and return its receiving end.
    pub fn subscribe(
        &self,
        meeting_id: MeetingId,
        subscriber_id: SubscriberId,
    ) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        self.register(Subscriber::new(subscriber_id, meeting_id, tx));
        rx
    }

    /// Remove a subscriber. Dropping the stored sender closes its channel.
    pub fn unsubscribe(&self, subscriber_id: &SubscriberId) -> bool {
        self.unregister(subscriber_id).is_some()
    }

    /// Deliver a message to every subscriber of a meeting without waiting.
    pub fn broadcast(&self, meeting_id: &MeetingId, message: WsMessage) -> BroadcastReport {
        let targets: Vec<(SubscriberId, mpsc::Sender<Outbound>)> = {
            let registry = self.registry();
            match registry.rooms.get(meeting_id) {
                Some(room) => room
                    .iter()
                    .map(|(id, tx)| (id.clone(), tx.clone()))
                    .collect(),
                None => return BroadcastReport::default(),
            }
        };

        let message_type = message.message_type().as_str();
        let message: Outbound = Arc::new(message);
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for (subscriber_id, tx) in targets {
            match tx.try_send(Arc::clone(&message)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    debug!(
                        meeting_id = %meeting_id,
                        subscriber_id = %subscriber_id,
                        message_type,
                        "Subscriber saturated, message dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    report.closed += 1;
                    closed.push((subscriber_id, tx));
                }
            }
        }

        if !closed.is_empty() {
            self.prune(meeting_id, closed);
        }

        metrics::record_delivered(message_type, report.delivered as u64);
        metrics::record_dropped(message_type, report.dropped as u64);
        report
    }

    /// Broadcast a frame's attention update followed by its alerts.
    pub fn publish_batch(&self, batch: &ResultBatch) -> BroadcastReport {
        let mut report = self.broadcast(&batch.meeting_id, WsMessage::attention_update(batch));
        for alert in &batch.alerts {
            report.merge(self.broadcast(&batch.meeting_id, WsMessage::alert(alert)));
        }
        report
    }

    /// Remove subscribers whose receiver was dropped, unless the id has
    /// since been re-registered with a fresh channel.
    fn prune(&self, meeting_id: &MeetingId, closed: Vec<(SubscriberId, mpsc::Sender<Outbound>)>) {
        let (subscribers, rooms) = {
            let mut registry = self.registry();
            for (subscriber_id, tx) in &closed {
                let stale = registry
                    .rooms
                    .get(meeting_id)
                    .and_then(|room| room.get(subscriber_id))
                    .is_some_and(|current| current.same_channel(tx));
                if stale {
                    registry.remove(subscriber_id);
                }
            }
            (registry.subscriber_total(), registry.rooms.len())
        };

        metrics::set_active(subscribers, rooms);
        info!(meeting_id = %meeting_id, pruned = closed.len(), "Pruned disconnected subscribers");
    }

    pub fn room_count(&self) -> usize {
        self.registry().rooms.len()
    }

    pub fn subscriber_count(&self, meeting_id: &MeetingId) -> usize {
        self.registry()
            .rooms
            .get(meeting_id)
            .map(|room| room.len())
            .unwrap_or(0)
    }

    pub fn total_subscribers(&self) -> usize {
        self.registry().subscriber_total()
    }
}

impl Default for DistributionHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
