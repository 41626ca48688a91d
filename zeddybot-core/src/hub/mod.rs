//! src/hub/mod.rs
//!
//! Fan-out of live chat lines to dashboard connections. Every subscriber
//! owns a bounded queue; the publisher never waits on any of them.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use zeddybot_common::models::ChatEvent;

use crate::Error;

/// What a dashboard connection receives.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Chat(ChatEvent),
    Heartbeat,
}

struct Subscriber {
    tx: mpsc::Sender<HubMessage>,
    joined_at: DateTime<Utc>,
    last_heartbeat_at: Option<DateTime<Utc>>,
    missed_heartbeats: u32,
}

struct HubInner {
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
    buffer_size: usize,
    max_missed_heartbeats: u32,
    shutdown_tx: watch::Sender<bool>,
}

impl HubInner {
    fn remove(&self, id: &Uuid) -> bool {
        self.subscribers.lock().remove(id).is_some()
    }
}

/// Set of live dashboard subscribers.
#[derive(Clone)]
pub struct LiveUpdateHub {
    inner: Arc<HubInner>,
}

/// Default size for each subscriber's buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 64;
pub const DEFAULT_MAX_MISSED_HEARTBEATS: u32 = 3;

impl Default for LiveUpdateHub {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_MAX_MISSED_HEARTBEATS)
    }
}

impl LiveUpdateHub {
    pub fn new(buffer_size: usize, max_missed_heartbeats: u32) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(HubInner {
                subscribers: Mutex::new(HashMap::new()),
                buffer_size: buffer_size.max(1),
                max_missed_heartbeats: max_missed_heartbeats.max(1),
                shutdown_tx,
            }),
        }
    }

    /// Registers a new subscriber. Everything published after this returns
    /// is delivered to it; nothing published before is.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.buffer_size);
        let id = Uuid::new_v4();

        let count = {
            let mut subs = self.inner.subscribers.lock();
            // Checked under the lock so a concurrent shutdown cannot miss us.
            if self.is_shutdown() {
                drop(subs);
                // Sender dropped here, so the stream ends immediately.
                return Subscription { id, rx, hub: Weak::new() };
            }
            subs.insert(
                id,
                Subscriber {
                    tx,
                    joined_at: Utc::now(),
                    last_heartbeat_at: None,
                    missed_heartbeats: 0,
                },
            );
            subs.len()
        };
        debug!("Hub subscriber {id} joined ({count} active)");

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Fans `event` out with `try_send`. A subscriber whose buffer is full is
    /// dropped; one whose receiver is gone is removed. Returns the number of
    /// subscribers that accepted the event.
    pub fn publish(&self, event: ChatEvent) -> usize {
        let mut delivered = 0;
        let mut subs = self.inner.subscribers.lock();
        subs.retain(|id, sub| match sub.tx.try_send(HubMessage::Chat(event.clone())) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                let err = Error::SubscriberOverflow(id.to_string());
                warn!("Dropping hub subscriber: {err} (joined {})", sub.joined_at);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Removes a subscriber. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: &Uuid) {
        if self.inner.remove(id) {
            debug!("Hub subscriber {id} left");
        }
    }

    /// Sends one heartbeat to every subscriber. A subscriber that could not
    /// take `max_missed_heartbeats` heartbeats in a row is removed.
    /// Returns how many subscribers were reaped.
    pub fn heartbeat(&self) -> usize {
        let max_missed = self.inner.max_missed_heartbeats;
        let now = Utc::now();
        let mut subs = self.inner.subscribers.lock();
        let before = subs.len();

        subs.retain(|id, sub| match sub.tx.try_send(HubMessage::Heartbeat) {
            Ok(()) => {
                sub.missed_heartbeats = 0;
                sub.last_heartbeat_at = Some(now);
                true
            }
            Err(TrySendError::Full(_)) => {
                sub.missed_heartbeats += 1;
                if sub.missed_heartbeats >= max_missed {
                    warn!(
                        "Hub subscriber {id} missed {} heartbeats (last ok: {:?}); removing",
                        sub.missed_heartbeats, sub.last_heartbeat_at
                    );
                    false
                } else {
                    true
                }
            }
            Err(TrySendError::Closed(_)) => false,
        });

        before - subs.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Clears all subscribers, ending their streams, and refuses new ones.
    pub fn shutdown(&self) {
        let drained = {
            let mut subs = self.inner.subscribers.lock();
            self.inner.shutdown_tx.send_replace(true);
            std::mem::take(&mut *subs)
        };
        info!("Hub shut down; closed {} subscriber(s)", drained.len());
    }

    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }
}

/// One dashboard connection's view of the hub. Ends when the hub drops the
/// subscriber; dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<HubMessage>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&mut self) -> Option<HubMessage> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = HubMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            if inner.remove(&self.id) {
                debug!("Hub subscriber {} dropped", self.id);
            }
        }
    }
}
