//! # Invalidation Bus
//!
//! Typed publish/subscribe for "this data changed" notices. There is one
//! broadcast channel per concrete [`Category`]; invalidating
//! [`Category::All`] fans out to every channel. A separate firehose channel
//! carries every event once, for consumers that care about all categories
//! (the cache service listener and the cross-process relay).
//!
//! ```text
//!   invalidate(Orders, id) ──► orders channel ──► Subscription(Orders)
//!                          └─► firehose ───────► Subscription(All), relay
//! ```

pub mod subscription;

#[cfg(feature = "redis")]
pub mod relay;

pub use subscription::{Freshness, ListenerHandle, Subscription};

#[cfg(feature = "redis")]
pub use relay::RedisRelay;

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use fieldops_domain::{Category, InvalidationEvent};

use crate::clock::SharedClock;

/// Process-wide invalidation broadcaster
pub struct InvalidationBus {
    id: Uuid,
    clock: SharedClock,
    channels: HashMap<Category, broadcast::Sender<InvalidationEvent>>,
    firehose: broadcast::Sender<InvalidationEvent>,
    last_invalidated: DashMap<Category, i64>,
}

impl InvalidationBus {
    pub fn new(clock: SharedClock, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let channels = Category::CONCRETE
            .iter()
            .map(|category| (*category, broadcast::channel(capacity).0))
            .collect();
        let (firehose, _) = broadcast::channel(capacity);

        Self {
            id: Uuid::new_v4(),
            clock,
            channels,
            firehose,
            last_invalidated: DashMap::new(),
        }
    }

    /// Identity stamped on events raised by this bus
    pub fn id(&self) -> Uuid {
        self.id
    }

    // =========================================================================
    // PUBLISHING
    // =========================================================================

    /// Mark `category` (optionally one entity of it) dirty for every subscriber
    pub fn invalidate(&self, category: Category, entity_id: Option<Uuid>) -> InvalidationEvent {
        let event = InvalidationEvent::new(category, entity_id, self.clock.now_millis(), self.id);
        tracing::debug!(
            category = %category,
            entity_id = ?entity_id,
            "Broadcasting invalidation"
        );
        self.dispatch(&event);
        event
    }

    pub fn invalidate_all(&self) -> InvalidationEvent {
        self.invalidate(Category::All, None)
    }

    /// Deliver an event raised by another bus instance.
    ///
    /// Returns `false` for events that originated here.
    pub fn inject_remote(&self, event: InvalidationEvent) -> bool {
        if event.origin == self.id {
            return false;
        }
        tracing::debug!(
            category = %event.category,
            origin = %event.origin,
            "Applying remote invalidation"
        );
        self.dispatch(&event);
        true
    }

    fn dispatch(&self, event: &InvalidationEvent) {
        for category in Category::CONCRETE.into_iter().filter(|c| event.affects(*c)) {
            self.last_invalidated
                .entry(category)
                .and_modify(|at| *at = (*at).max(event.raised_at))
                .or_insert(event.raised_at);

            if let Some(tx) = self.channels.get(&category) {
                // No receivers is not an error: nobody holds data for it
                let _ = tx.send(event.clone());
            }
        }
        let _ = self.firehose.send(event.clone());
    }

    // =========================================================================
    // SUBSCRIBING
    // =========================================================================

    /// Subscribe to one category, or to everything with [`Category::All`]
    pub fn subscribe(&self, category: Category) -> Subscription {
        Subscription::new(category, self.sender(category).subscribe())
    }

    /// Run `callback` for every event affecting `category` until the
    /// returned handle is dropped. Must be called inside a Tokio runtime.
    pub fn on_invalidate<F>(&self, category: Category, callback: F) -> ListenerHandle
    where
        F: Fn(&InvalidationEvent) + Send + Sync + 'static,
    {
        let mut rx = self.sender(category).subscribe();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(category = %category, skipped, "Listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        ListenerHandle::new(category, task)
    }

    /// Raw receiver of every event, local and remote
    pub fn firehose(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.firehose.subscribe()
    }

    pub fn subscriber_count(&self, category: Category) -> usize {
        self.sender(category).receiver_count()
    }

    /// Most recent invalidation time for `category`.
    ///
    /// For [`Category::All`] this is the latest time any category was
    /// invalidated.
    pub fn last_invalidated(&self, category: Category) -> Option<i64> {
        category
            .expand()
            .into_iter()
            .filter_map(|c| self.last_invalidated.get(&c).map(|at| *at))
            .max()
    }

    fn sender(&self, category: Category) -> &broadcast::Sender<InvalidationEvent> {
        self.channels.get(&category).unwrap_or(&self.firehose)
    }
}

impl std::fmt::Debug for InvalidationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationBus")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn bus() -> (InvalidationBus, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        (InvalidationBus::new(clock.clone(), 16), clock)
    }

    #[test]
    fn test_fresh_dirty_fresh() {
        let (bus, _) = bus();
        let mut orders = bus.subscribe(Category::Orders);
        assert_eq!(orders.sync(), Freshness::Fresh);

        bus.invalidate(Category::Orders, None);
        assert_eq!(orders.sync(), Freshness::Dirty);

        orders.mark_fresh();
        assert_eq!(orders.sync(), Freshness::Fresh);
    }

    #[test]
    fn test_reinvalidation_while_dirty_updates_timestamp() {
        let (bus, clock) = bus();
        let mut invoices = bus.subscribe(Category::Invoices);

        bus.invalidate(Category::Invoices, None);
        clock.advance(Duration::from_secs(3));
        let id = Uuid::new_v4();
        bus.invalidate(Category::Invoices, Some(id));

        assert_eq!(invoices.sync(), Freshness::Dirty);
        assert_eq!(invoices.last_invalidated(), Some(13_000));
        assert_eq!(invoices.last_entity(), Some(id));
    }

    #[test]
    fn test_other_categories_untouched() {
        let (bus, _) = bus();
        let mut clients = bus.subscribe(Category::Clients);

        bus.invalidate(Category::Orders, None);
        assert!(!clients.is_stale());
        assert_eq!(bus.last_invalidated(Category::Clients), None);
        assert_eq!(bus.last_invalidated(Category::Orders), Some(10_000));
    }

    #[test]
    fn test_invalidate_all_reaches_every_category() {
        let (bus, _) = bus();
        let mut subs: Vec<_> = Category::CONCRETE
            .iter()
            .map(|c| bus.subscribe(*c))
            .collect();
        let mut everything = bus.subscribe(Category::All);

        bus.invalidate_all();

        assert!(subs.iter_mut().all(Subscription::is_stale));
        assert!(everything.is_stale());
        for category in Category::CONCRETE {
            assert_eq!(bus.last_invalidated(category), Some(10_000));
        }
    }

    #[test]
    fn test_stale_since_compares_timestamps() {
        let (bus, clock) = bus();
        let mut teams = bus.subscribe(Category::Teams);

        bus.invalidate(Category::Teams, None);
        clock.advance(Duration::from_secs(1));
        let fetched_at = 11_000;
        assert!(!teams.is_stale_since(fetched_at));

        bus.invalidate(Category::Teams, None);
        assert!(teams.is_stale_since(fetched_at));
    }

    #[test]
    fn test_subscribe_and_drop_tracks_count() {
        let (bus, _) = bus();
        let a = bus.subscribe(Category::Units);
        let b = bus.subscribe(Category::Units);
        assert_eq!(bus.subscriber_count(Category::Units), 2);

        a.unsubscribe();
        drop(b);
        assert_eq!(bus.subscriber_count(Category::Units), 0);
    }

    #[test]
    fn test_remote_events_from_self_ignored() {
        let (bus, _) = bus();
        let mut sub = bus.subscribe(Category::Orders);

        let own = InvalidationEvent::new(Category::Orders, None, 1, bus.id());
        assert!(!bus.inject_remote(own));
        assert!(!sub.is_stale());

        let foreign = InvalidationEvent::new(Category::Orders, None, 1, Uuid::new_v4());
        assert!(bus.inject_remote(foreign));
        assert!(sub.is_stale());
    }

    #[test]
    fn test_lagged_subscriber_is_dirty() {
        let clock = Arc::new(ManualClock::new(0));
        let bus = InvalidationBus::new(clock, 1);
        let mut sub = bus.subscribe(Category::Orders);

        bus.invalidate(Category::Orders, None);
        bus.invalidate(Category::Orders, None);
        bus.invalidate(Category::Orders, None);
        assert_eq!(sub.sync(), Freshness::Dirty);
    }

    #[tokio::test]
    async fn test_recv_delivers_event() {
        let (bus, _) = bus();
        let mut sub = bus.subscribe(Category::Commodities);
        let id = Uuid::new_v4();

        bus.invalidate(Category::Commodities, Some(id));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.entity_id, Some(id));
        assert_eq!(sub.status(), Freshness::Dirty);
    }

    #[tokio::test]
    async fn test_listener_stops_after_dispose() {
        let (bus, _) = bus();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let handle = bus.on_invalidate(Category::Orders, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(Category::Orders), 1);

        bus.invalidate(Category::Orders, None);
        bus.invalidate(Category::Clients, None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        handle.dispose();
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.invalidate(Category::Orders, None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(Category::Orders), 0);
    }
}
