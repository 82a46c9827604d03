//! Fan-out hub: subscribers register a bounded outbound channel; a single
//! broadcaster loop periodically emits snapshot envelopes to all of them.
//! Grounded on the pack's `ag-ui-server` WebSocket transport (bounded
//! per-subscriber `mpsc`, drop-on-full, ping/pong liveness) generalized
//! from one wire protocol to this crate's envelope kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::clock::Clock;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 32;
const MAX_CONSECUTIVE_DROPS: u32 = 5;
const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(54);
const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    MetricsUpdate,
    RecommendationsUpdate,
    StatusUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub kind: EnvelopeKind,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

pub type SubscriberId = Uuid;

struct Subscriber {
    sender: mpsc::Sender<PushEnvelope>,
    consecutive_drops: u32,
    last_activity: Instant,
}

/// Handle returned to a subscriber; dropping it lets the broadcaster
/// notice the channel has closed on the next send attempt.
pub struct SubscriptionHandle {
    pub id: SubscriberId,
    registry: Arc<RwLock<HashMap<SubscriberId, Subscriber>>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.registry.write().unwrap().remove(&self.id);
    }
}

pub struct PushBroadcaster {
    registry: Arc<RwLock<HashMap<SubscriberId, Subscriber>>>,
    broadcast_interval: Duration,
    keepalive_interval: Duration,
    read_deadline: Duration,
    clock: Arc<dyn Clock>,
    dropped_total: AtomicU64,
}

impl PushBroadcaster {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            read_deadline: DEFAULT_READ_DEADLINE,
            clock,
            dropped_total: AtomicU64::new(0),
        }
    }

    pub fn with_broadcast_interval(mut self, interval: Duration) -> Self {
        self.broadcast_interval = interval;
        self
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.read().unwrap().len()
    }

    pub fn subscribe(&self) -> (SubscriptionHandle, mpsc::Receiver<PushEnvelope>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = Uuid::new_v4();
        self.registry.write().unwrap().insert(
            id,
            Subscriber {
                sender: tx,
                consecutive_drops: 0,
                last_activity: Instant::now(),
            },
        );
        (
            SubscriptionHandle {
                id,
                registry: self.registry.clone(),
            },
            rx,
        )
    }

    /// Marks a subscriber as having acknowledged activity (e.g. a pong),
    /// resetting its read-deadline clock.
    pub fn note_activity(&self, id: SubscriberId) {
        if let Some(sub) = self.registry.write().unwrap().get_mut(&id) {
            sub.last_activity = Instant::now();
        }
    }

    /// Broadcasts one envelope to every subscriber. Full queues drop the
    /// message for that subscriber only; after `MAX_CONSECUTIVE_DROPS` the
    /// subscriber is disconnected unilaterally. Returns the count of
    /// subscribers that received the message.
    pub fn broadcast(&self, envelope: PushEnvelope) -> usize {
        let mut registry = self.registry.write().unwrap();
        if registry.is_empty() {
            return 0;
        }
        let mut delivered = 0;
        let mut to_remove = Vec::new();
        let now = Instant::now();

        for (id, sub) in registry.iter_mut() {
            if now.duration_since(sub.last_activity) > self.read_deadline {
                to_remove.push(*id);
                continue;
            }
            match sub.sender.try_send(envelope.clone()) {
                Ok(()) => {
                    delivered += 1;
                    sub.consecutive_drops = 0;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.consecutive_drops += 1;
                    self.dropped_total.fetch_add(1, Ordering::Relaxed);
                    if sub.consecutive_drops >= MAX_CONSECUTIVE_DROPS {
                        to_remove.push(*id);
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    to_remove.push(*id);
                }
            }
        }

        for id in to_remove {
            registry.remove(&id);
        }
        delivered
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn broadcast_interval(&self) -> Duration {
        self.broadcast_interval
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn test_envelope() -> PushEnvelope {
        PushEnvelope {
            kind: EnvelopeKind::StatusUpdate,
            timestamp: Utc::now(),
            payload: serde_json::json!({"ok": true}),
        }
    }

    #[test]
    fn broadcast_with_no_subscribers_delivers_nothing() {
        let broadcaster = PushBroadcaster::new(Arc::new(SystemClock));
        assert_eq!(broadcaster.broadcast(test_envelope()), 0);
    }

    #[test]
    fn subscriber_receives_broadcast_until_dropped() {
        let broadcaster = PushBroadcaster::new(Arc::new(SystemClock));
        let (handle, mut rx) = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        broadcaster.broadcast(test_envelope());
        assert!(rx.try_recv().is_ok());
        drop(handle);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn full_queue_drops_for_that_subscriber_only() {
        let broadcaster = PushBroadcaster::new(Arc::new(SystemClock));
        let (_handle, _rx) = broadcaster.subscribe();
        for _ in 0..(SUBSCRIBER_QUEUE_CAPACITY + 2) {
            broadcaster.broadcast(test_envelope());
        }
        assert!(broadcaster.dropped_total() > 0);
    }
}
