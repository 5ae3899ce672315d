// src/broadcast/channel.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, warn};

use super::{BroadcastEvent, Payload};
use crate::errors::DeliveryError;

/// Opaque subscriber identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The subscriber's end of the channel.
///
/// Dropping the handle detaches the subscriber; the channel notices on the
/// next broadcast and prunes it. `recv` returns `None` once the channel has
/// dropped this subscriber (closed, or the subscriber fell behind).
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriberId,
    rx: mpsc::Receiver<BroadcastEvent>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<BroadcastEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive; `None` if nothing is queued or the channel is gone.
    pub fn try_recv(&mut self) -> Option<BroadcastEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Subscriber set plus best-effort fan-out.
///
/// Each subscriber owns a bounded queue. Delivery never waits: a subscriber
/// whose queue is closed or full is dropped and the remaining subscribers
/// are unaffected.
pub struct BroadcastChannel {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<BroadcastEvent>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("subscribers", &self.subscriber_count())
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl BroadcastChannel {
    /// `buffer` is the per-subscriber queue length (clamped to at least 1).
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self) -> SubscriptionHandle {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        debug!(subscriber = %id, "subscriber attached");
        SubscriptionHandle { id, rx }
    }

    /// Send an event to every attached subscriber. Returns how many
    /// subscribers it was delivered to.
    pub fn broadcast(&self, name: &str, payload: Payload) -> usize {
        let event = BroadcastEvent {
            name: name.to_string(),
            payload,
        };

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;

        subscribers.retain(|id, tx| match deliver(tx, &event) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(DeliveryError::Closed) => {
                debug!(subscriber = %id, "subscriber detached; pruning");
                false
            }
            Err(err @ DeliveryError::Full) => {
                warn!(subscriber = %id, error = %err, event = %event.name, "dropping subscriber");
                false
            }
        });

        debug!(event = %event.name, delivered, "broadcast complete");
        delivered
    }

    /// Number of subscribers that are still attached.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|_, tx| !tx.is_closed());
        subscribers.len()
    }

    /// Detach every subscriber; their handles observe end-of-stream once
    /// queued events are drained.
    pub fn close(&self) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let count = subscribers.len();
        subscribers.clear();
        debug!(count, "broadcast channel closed");
    }
}

fn deliver(tx: &mpsc::Sender<BroadcastEvent>, event: &BroadcastEvent) -> Result<(), DeliveryError> {
    tx.try_send(event.clone()).map_err(|err| match err {
        TrySendError::Full(_) => DeliveryError::Full,
        TrySendError::Closed(_) => DeliveryError::Closed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Payload {
        json!({"added": ["/a.rb"]}).as_object().cloned().unwrap()
    }

    #[test]
    fn fans_out_to_every_subscriber() {
        let channel = BroadcastChannel::new(8);
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();

        assert_eq!(channel.broadcast("reload", payload()), 2);
        assert_eq!(a.try_recv().unwrap().name, "reload");
        assert_eq!(b.try_recv().unwrap().payload, payload());
    }

    #[test]
    fn dropped_handles_are_pruned() {
        let channel = BroadcastChannel::new(8);
        let keep = channel.subscribe();
        let gone = channel.subscribe();
        drop(gone);

        assert_eq!(channel.broadcast("reload", payload()), 1);
        assert_eq!(channel.subscriber_count(), 1);
        drop(keep);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn full_subscriber_is_dropped_without_affecting_others() {
        let channel = BroadcastChannel::new(1);
        let mut slow = channel.subscribe();
        let mut fast = channel.subscribe();

        assert_eq!(channel.broadcast("reload", payload()), 2);
        assert!(fast.try_recv().is_some());

        // `slow` never drained its single slot.
        assert_eq!(channel.broadcast("reload", payload()), 1);
        assert!(fast.try_recv().is_some());
        assert_eq!(channel.subscriber_count(), 1);

        // The slow subscriber still gets what was queued, then end-of-stream.
        assert!(slow.try_recv().is_some());
        assert!(slow.try_recv().is_none());
    }

    #[tokio::test]
    async fn close_ends_every_stream() {
        let channel = BroadcastChannel::new(4);
        let mut handle = channel.subscribe();
        channel.broadcast("reload", payload());
        channel.close();

        assert!(handle.recv().await.is_some());
        assert!(handle.recv().await.is_none());
    }
}
