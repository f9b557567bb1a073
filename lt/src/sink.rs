//! Sink - caller-owned delivery target for a Feed
//!
//! Delivery is pull based. [`Listener::recv`] registers a demand carrying a
//! oneshot reply channel; the feed worker takes a value out of its mailbox only
//! once it holds such a demand, and hands it over synchronously. A value never
//! waits anywhere a receiver could pick it up after it was superseded.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::RecvError;

/// Reply channel of one pending receive
pub(crate) type Waiter<T> = oneshot::Sender<T>;

/// The output side a [`Feed`](crate::Feed) delivers into
///
/// A sink is also its own subscriber identity: clones compare equal and hash
/// alike, distinct sinks never do.
pub struct Sink<T> {
    demands: Arc<Mutex<mpsc::UnboundedReceiver<Waiter<T>>>>,
}

/// Receiving half paired with a [`Sink`]
pub struct Listener<T> {
    demands: mpsc::UnboundedSender<Waiter<T>>,
}

/// Create a sink and its listener
///
/// A delivery happens only while the listener is waiting in
/// [`Listener::recv`], so nothing is ever buffered.
pub fn sink<T>() -> (Sink<T>, Listener<T>) {
    debug!("sink: creating channel");
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Sink {
            demands: Arc::new(Mutex::new(rx)),
        },
        Listener { demands: tx },
    )
}

impl<T> Sink<T> {
    /// Wait for a live receive request
    ///
    /// Requests whose receiver already gave up are skipped. Returns None once
    /// the listener is gone.
    pub(crate) async fn demand(&self) -> Option<Waiter<T>> {
        let mut demands = self.demands.lock().await;
        while let Some(waiter) = demands.recv().await {
            if !waiter.is_closed() {
                return Some(waiter);
            }
            trace!("Sink::demand: skipping abandoned receive");
        }
        None
    }
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            demands: self.demands.clone(),
        }
    }
}

impl<T> PartialEq for Sink<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.demands, &other.demands)
    }
}

impl<T> Eq for Sink<T> {}

impl<T> Hash for Sink<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.demands), state);
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("id", &Arc::as_ptr(&self.demands)).finish()
    }
}

impl<T> Listener<T> {
    /// Receive the latest value
    ///
    /// Waits until a feed delivers. Fails once every sender of the paired sink
    /// is gone. Dropping the future before it completes withdraws the request;
    /// a value handed over in that same instant is lost.
    pub async fn recv(&self) -> Result<T, RecvError> {
        let (waiter, reply) = oneshot::channel();
        self.demands.send(waiter).map_err(|_| RecvError)?;
        reply.await.map_err(|_| RecvError)
    }

    /// Whether every sender of the paired sink is gone
    pub fn is_disconnected(&self) -> bool {
        self.demands.is_closed()
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_clone_is_same_sink() {
        let (tx, _rx) = sink::<u32>();
        let other = tx.clone();
        assert_eq!(tx, other);

        let mut set = HashSet::new();
        set.insert(tx);
        assert!(!set.insert(other));
    }

    #[test]
    fn test_distinct_channels_differ() {
        let (tx1, _rx1) = sink::<u32>();
        let (tx2, _rx2) = sink::<u32>();
        assert_ne!(tx1, tx2);
    }

    #[tokio::test]
    async fn test_demand_reaches_sink() {
        let (tx, rx) = sink();

        let receiver = tokio::spawn(async move { rx.recv().await });
        let waiter = tx.demand().await.unwrap();
        waiter.send(9).unwrap();

        assert_eq!(receiver.await.unwrap().unwrap(), 9);
    }

    #[tokio::test]
    async fn test_abandoned_receive_is_skipped() {
        let (tx, rx) = sink();

        // Request withdrawn by timeout
        let abandoned = tokio::time::timeout(Duration::from_millis(5), rx.recv()).await;
        assert!(abandoned.is_err());

        let receiver = tokio::spawn(async move { rx.recv().await });
        let waiter = tx.demand().await.unwrap();
        waiter.send(3).unwrap();
        assert_eq!(receiver.await.unwrap().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_disconnect_both_ways() {
        let (tx, rx) = sink::<u32>();
        drop(rx);
        assert!(tx.demand().await.is_none());

        let (tx, rx) = sink::<u32>();
        drop(tx);
        assert!(rx.is_disconnected());
        assert!(rx.recv().await.is_err());
    }
}
