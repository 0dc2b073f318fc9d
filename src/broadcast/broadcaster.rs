// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::wire::WireMessage;
use crate::observability::messages::broadcast::{MessagesDropped, SubscriberConnected, SubscriberDisconnected};
use crate::observability::messages::StructuredLog;

/// Drop warnings are repeated every this many drops per subscriber.
const DROP_LOG_EVERY: u64 = 100;

struct Slot {
    id: u64,
    tx: mpsc::Sender<Arc<str>>,
    dropped: u64,
}

struct Inner {
    topic: String,
    queue: usize,
    next_id: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    closed: AtomicBool,
    slots: Mutex<Vec<Slot>>,
}

/// Fire-and-forget publisher on a named topic.
///
/// Each subscriber owns a bounded queue. Publishing never waits: a message that does not
/// fit into a subscriber's queue is dropped for that subscriber and counted. Subscribers
/// only see messages published after they subscribed.
///
/// Cloning is cheap; clones publish to the same subscribers.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

/// Receiving end of one subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next serialized message, or `None` once the broadcaster is closed.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    /// Next message, decoded.
    pub async fn recv_message(&mut self) -> Option<Result<WireMessage, serde_json::Error>> {
        self.rx.recv().await.map(|text| serde_json::from_str(&text))
    }

    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }
}

impl Broadcaster {
    pub fn new(topic: impl Into<String>, queue: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                topic: topic.into(),
                queue: queue.max(1),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                slots: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        // Slots stay consistent even if a holder panicked: every mutation is a push or a retain.
        self.inner.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribe_from(None)
    }

    pub(crate) fn subscribe_from(&self, peer: Option<SocketAddr>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.queue);
        let mut slots = self.slots();
        // Checked under the lock so that a concurrent close() cannot miss this slot.
        if !self.inner.closed.load(Ordering::Acquire) {
            slots.push(Slot { id, tx, dropped: 0 });
            SubscriberConnected {
                topic: &self.inner.topic,
                subscriber: id,
                peer,
            }
            .log();
        }
        Subscription { id, rx }
    }

    /// Serializes `message` once and offers it to every subscriber.
    ///
    /// Returns how many subscribers accepted it. Never blocks.
    pub fn send_data(&self, message: &WireMessage) -> Result<usize, serde_json::Error> {
        let payload: Arc<str> = serde_json::to_string(message)?.into();
        Ok(self.send_raw(payload))
    }

    pub fn send_raw(&self, payload: Arc<str>) -> usize {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        let topic = self.inner.topic.as_str();
        let mut delivered = 0;
        let mut slots = self.slots();
        slots.retain_mut(|slot| match slot.tx.try_send(payload.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                slot.dropped += 1;
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                if slot.dropped == 1 || slot.dropped % DROP_LOG_EVERY == 0 {
                    MessagesDropped {
                        topic,
                        subscriber: slot.id,
                        dropped: slot.dropped,
                    }
                    .log();
                }
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                SubscriberDisconnected {
                    topic,
                    subscriber: slot.id,
                    dropped: slot.dropped,
                }
                .log();
                false
            }
        });
        delivered
    }

    /// Messages dropped across all subscribers because their queues were full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots().iter().filter(|slot| !slot.tx.is_closed()).count()
    }

    /// Releases the channel: every subscription ends after draining its queue, and later
    /// subscriptions end immediately.
    pub fn close(&self) {
        let mut slots = self.slots();
        self.inner.closed.store(true, Ordering::Release);
        slots.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("topic", &self.inner.topic)
            .field("queue", &self.inner.queue)
            .field("published", &self.published())
            .field("dropped", &self.dropped())
            .finish()
    }
}
