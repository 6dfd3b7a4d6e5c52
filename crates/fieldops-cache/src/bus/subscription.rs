//! Subscriber side of the invalidation bus.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use fieldops_domain::{Category, InvalidationEvent};

/// Per-category freshness as seen by one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Dirty,
}

/// Receiving end for one category.
///
/// Starts `Fresh`; any event for the category turns it `Dirty` until the
/// holder refetches and calls [`Subscription::mark_fresh`]. Dropping the
/// subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    category: Category,
    receiver: broadcast::Receiver<InvalidationEvent>,
    status: Freshness,
    last_invalidated: Option<i64>,
    last_entity: Option<Uuid>,
}

impl Subscription {
    pub(crate) fn new(category: Category, receiver: broadcast::Receiver<InvalidationEvent>) -> Self {
        Self {
            category,
            receiver,
            status: Freshness::Fresh,
            last_invalidated: None,
            last_entity: None,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Wait for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<InvalidationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    self.record(&event);
                    return Some(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(category = %self.category, skipped, "Subscriber lagged");
                    self.status = Freshness::Dirty;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Drain pending events without waiting and return the resulting state
    pub fn sync(&mut self) -> Freshness {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => self.record(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(category = %self.category, skipped, "Subscriber lagged");
                    self.status = Freshness::Dirty;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        self.status
    }

    /// State as of the last `recv`/`sync`
    pub fn status(&self) -> Freshness {
        self.status
    }

    /// Drain pending events and report whether held data must be refetched
    pub fn is_stale(&mut self) -> bool {
        self.sync() == Freshness::Dirty
    }

    /// Whether data fetched at `fetched_at` predates the latest invalidation
    pub fn is_stale_since(&mut self, fetched_at: i64) -> bool {
        self.sync();
        self.last_invalidated.is_some_and(|at| at >= fetched_at)
    }

    /// Record that a refetch completed
    pub fn mark_fresh(&mut self) {
        self.status = Freshness::Fresh;
    }

    pub fn last_invalidated(&self) -> Option<i64> {
        self.last_invalidated
    }

    /// Entity named by the most recent event, if it named one
    pub fn last_entity(&self) -> Option<Uuid> {
        self.last_entity
    }

    pub fn unsubscribe(self) {
        tracing::trace!(category = %self.category, "Unsubscribed");
    }

    fn record(&mut self, event: &InvalidationEvent) {
        self.status = Freshness::Dirty;
        self.last_invalidated = Some(
            self.last_invalidated
                .map_or(event.raised_at, |prev| prev.max(event.raised_at)),
        );
        self.last_entity = event.entity_id;
    }
}

/// Disposal handle for a callback registered with
/// [`InvalidationBus::on_invalidate`](super::InvalidationBus::on_invalidate).
///
/// The callback stops running once the handle is dropped or disposed.
#[derive(Debug)]
pub struct ListenerHandle {
    category: Category,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(category: Category, task: JoinHandle<()>) -> Self {
        Self { category, task }
    }

    pub fn dispose(self) {}
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(category = %self.category, "Invalidation listener disposed");
    }
}
