//! Broadcast - publish/subscribe for latest-value notification
//!
//! Each subscriber gets its own [`Feed`], so a slow consumer only ever delays
//! itself. Updates fan out under a shared lock; subscription changes take the
//! lock exclusively and never hold it across an await.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::feed::Feed;
use crate::sink::Sink;

/// Publish/subscribe hub for update notification
///
/// All methods may be called concurrently. Per subscriber, delivered values
/// follow submission order with intermediate values possibly skipped; there is
/// no ordering across subscribers.
///
/// Dropping a Broadcast closes every feed it still holds.
pub struct Broadcast<T> {
    /// Feed per subscribed sink
    feeds: RwLock<HashMap<Sink<T>, Feed<T>>>,
}

impl<T> Broadcast<T> {
    /// Create a broadcast without subscribers
    pub fn new() -> Self {
        debug!("Broadcast::new: called");
        Self {
            feeds: RwLock::new(HashMap::new()),
        }
    }

    /// Number of registered subscribers
    pub fn subscription_count(&self) -> usize {
        self.read().len()
    }

    /// Whether `sink` is currently subscribed
    pub fn is_subscribed(&self, sink: &Sink<T>) -> bool {
        self.read().contains_key(sink)
    }

    /// Terminate a subscription
    ///
    /// Returns once the subscriber's feed has exited; nothing is delivered to
    /// `sink` afterwards. Unknown sinks are ignored.
    pub async fn unsubscribe(&self, sink: &Sink<T>) {
        let removed = self.write().remove(sink);

        let Some(feed) = removed else {
            debug!("Broadcast::unsubscribe: not subscribed");
            return;
        };

        debug!("Broadcast::unsubscribe: stopping feed");
        if let Err(e) = feed.shutdown().await {
            warn!("Broadcast::unsubscribe: {}", e);
        }
    }

    /// Terminate all subscriptions
    pub async fn unsubscribe_all(&self) {
        let drained: Vec<Feed<T>> = self.write().drain().map(|(_, feed)| feed).collect();
        info!(count = drained.len(), "Broadcast::unsubscribe_all: stopping feeds");

        let results = join_all(drained.into_iter().map(Feed::shutdown)).await;
        for e in results.into_iter().filter_map(Result::err) {
            warn!("Broadcast::unsubscribe_all: {}", e);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Sink<T>, Feed<T>>> {
        self.feeds.read().unwrap_or_else(PoisonError::into_inner)
    }

    // Mutations are single insert/remove calls, so a poisoned map is still coherent.
    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Sink<T>, Feed<T>>> {
        self.feeds.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + 'static> Broadcast<T> {
    /// Set the current version
    ///
    /// Hands a copy to every subscriber's feed. Never waits on consumers.
    pub fn update(&self, value: T) {
        let feeds = self.read();
        debug!(subscribers = feeds.len(), "Broadcast::update: called");

        for feed in feeds.values() {
            feed.submit(value.clone());
        }
    }

    /// Add an update receiver
    ///
    /// Duplicate subscriptions are ignored.
    pub fn subscribe(&self, sink: Sink<T>) {
        let mut feeds = self.write();
        if feeds.contains_key(&sink) {
            debug!("Broadcast::subscribe: already subscribed");
            return;
        }

        let feed = Feed::new(sink.clone());
        feeds.insert(sink, feed);
        debug!(subscribers = feeds.len(), "Broadcast::subscribe: added");
    }
}

impl<T> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Broadcast<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcast")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sink::{Listener, sink};

    /// Assert that nothing arrives within a short window
    async fn assert_nothing_delivered<T: std::fmt::Debug>(rx: &Listener<T>) {
        let late = tokio::time::timeout(Duration::from_millis(20), rx.recv()).await;
        assert!(late.is_err(), "Unexpected delivery: {:?}", late);
    }

    #[tokio::test]
    async fn test_broadcast_creation() {
        let broadcast = Broadcast::<u32>::new();
        assert_eq!(broadcast.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_update_sequence_two_subscribers() {
        let broadcast = Broadcast::new();

        let (tx1, rx1) = sink();
        let (tx2, rx2) = sink();
        broadcast.subscribe(tx1);
        broadcast.subscribe(tx2);

        broadcast.update("1st update");
        broadcast.update("2nd update");
        broadcast.update("3rd update");
        assert_eq!(rx1.recv().await.unwrap(), "3rd update");

        broadcast.update("4th update");
        assert_eq!(rx2.recv().await.unwrap(), "4th update");

        broadcast.update("5th update");
        assert_eq!(rx1.recv().await.unwrap(), "5th update");
        assert_eq!(rx2.recv().await.unwrap(), "5th update");

        broadcast.unsubscribe_all().await;
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_ignored() {
        let broadcast = Broadcast::new();
        let (tx, rx) = sink();

        broadcast.subscribe(tx.clone());
        broadcast.subscribe(tx.clone());
        assert_eq!(broadcast.subscription_count(), 1);
        assert!(broadcast.is_subscribed(&tx));

        // Still exactly one delivery per update
        broadcast.update(42);
        assert_eq!(rx.recv().await.unwrap(), 42);
        assert_nothing_delivered(&rx).await;
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let broadcast = Broadcast::new();
        let (tx1, rx1) = sink();
        let (tx2, rx2) = sink();
        broadcast.subscribe(tx1.clone());
        broadcast.subscribe(tx2.clone());

        broadcast.unsubscribe(&tx1).await;
        assert_eq!(broadcast.subscription_count(), 1);
        assert!(!broadcast.is_subscribed(&tx1));

        broadcast.update(7);
        assert_eq!(rx2.recv().await.unwrap(), 7);
        assert_nothing_delivered(&rx1).await;
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_pending() {
        let broadcast = Broadcast::new();
        let (tx, rx) = sink();
        broadcast.subscribe(tx.clone());

        broadcast.update(1);
        tokio::task::yield_now().await;
        broadcast.unsubscribe(&tx).await;

        assert_nothing_delivered(&rx).await;
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_is_noop() {
        let broadcast = Broadcast::new();
        let (tx, _rx) = sink::<u32>();
        let (stranger, _stranger_rx) = sink::<u32>();
        broadcast.subscribe(tx);

        broadcast.unsubscribe(&stranger).await;
        assert_eq!(broadcast.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_all() {
        let broadcast = Broadcast::new();
        let mut listeners = Vec::new();
        for _ in 0..5 {
            let (tx, rx) = sink::<u32>();
            broadcast.subscribe(tx);
            listeners.push(rx);
        }
        assert_eq!(broadcast.subscription_count(), 5);

        broadcast.unsubscribe_all().await;
        assert_eq!(broadcast.subscription_count(), 0);

        // Every feed is gone and with it the last sender of each sink
        for rx in listeners {
            assert!(rx.is_disconnected());
        }
    }

    #[tokio::test]
    async fn test_update_no_subscribers() {
        let broadcast = Broadcast::new();
        // This should not panic even with no subscribers
        broadcast.update("nobody listening");
        assert_eq!(broadcast.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_resubscribe_after_unsubscribe() {
        let broadcast = Broadcast::new();
        let (tx, rx) = sink();

        broadcast.subscribe(tx.clone());
        broadcast.unsubscribe(&tx).await;
        broadcast.subscribe(tx.clone());
        assert_eq!(broadcast.subscription_count(), 1);

        broadcast.update("again");
        assert_eq!(rx.recv().await.unwrap(), "again");
    }
}
