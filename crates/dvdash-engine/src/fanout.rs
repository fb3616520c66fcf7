use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::event::DashboardEvent;

/// Unique subscriber identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub String);

impl Default for SubscriberId {
    fn default() -> Self {
        Self(format!("sub_{}", Uuid::now_v7()))
    }
}

impl SubscriberId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers dropped because their queue was full or closed.
    pub disconnected: usize,
}

/// Registry of live subscribers, each with a bounded delivery queue.
///
/// Publishing never waits: a subscriber whose queue is full is
/// disconnected instead of slowing down ingestion.
pub struct Fanout {
    subscribers: DashMap<SubscriberId, mpsc::Sender<DashboardEvent>>,
    max_send_queue: usize,
}

impl Fanout {
    pub fn new(max_send_queue: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: DashMap::new(),
            max_send_queue: max_send_queue.max(1),
        })
    }

    /// Register a new subscriber. It receives every event published after
    /// this call returns.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.subscribers.insert(id.clone(), tx);
        tracing::debug!(subscriber_id = %id, "Subscriber registered");
        Subscription {
            id,
            rx,
            fanout: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            tracing::debug!(subscriber_id = %id, "Subscriber removed");
        }
        removed
    }

    /// Deliver `event` to every registered subscriber.
    pub fn publish(&self, event: &DashboardEvent) -> PublishReport {
        let mut report = PublishReport::default();
        let mut dead = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber_id = %entry.key(),
                        queue = self.max_send_queue,
                        "Send queue full, disconnecting subscriber"
                    );
                    dead.push(entry.key().clone());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(entry.key().clone()),
            }
        }

        // removal outside the iteration, DashMap shards are still locked above
        for id in dead {
            if self.subscribers.remove(&id).is_some() {
                report.disconnected += 1;
            }
        }
        report
    }

    /// Number of registered subscribers.
    pub fn count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Live handle returned by [`Fanout::subscribe`]. Dropping it unsubscribes.
///
/// The stream ends once the fanout disconnects the subscriber.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<DashboardEvent>,
    fanout: Weak<Fanout>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Wait for the next event. `None` once disconnected.
    pub async fn recv(&mut self) -> Option<DashboardEvent> {
        self.rx.recv().await
    }

    /// Next already-queued event, if any.
    pub fn try_recv(&mut self) -> Option<DashboardEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = DashboardEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(fanout) = self.fanout.upgrade() {
            fanout.unsubscribe(&self.id);
        }
    }
}
