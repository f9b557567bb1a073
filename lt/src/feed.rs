//! Feed - latest-value relay for a single sink
//!
//! A Feed owns one worker task and a single-slot mailbox. Producers swap values
//! into the slot and never wait on the consumer. The worker takes the value out
//! only once the consumer is actually waiting in [`Listener::recv`], so a value
//! replaced before that moment is dropped and can never be delivered.
//!
//! ```text
//!  submit(1) submit(2) submit(3)            recv() -> 3
//!      │         │         │                  ▲   │ demand
//!      ▼         ▼         ▼                  │   ▼
//!  ┌─────────────────────────┐  take   ┌────────────┐
//!  │  mailbox (one slot)     │ ──────▶ │   worker   │
//!  └─────────────────────────┘         └────────────┘
//! ```
//!
//! [`Listener::recv`]: crate::sink::Listener::recv

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::FeedError;
use crate::sink::Sink;

/// Mailbox content
enum Slot<T> {
    Empty,
    Value(T),
    Closed,
}

/// Single-slot mailbox shared by the input handle and the worker
struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    /// Woken on every put and on close
    notify: Notify,
}

impl<T> Mailbox<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            notify: Notify::new(),
        }
    }

    /// Store a value, replacing any pending one
    ///
    /// Returns true when an undelivered value was superseded.
    fn put(&self, value: T) -> bool {
        let mut slot = self.lock();
        let superseded = match *slot {
            Slot::Closed => return false,
            Slot::Value(_) => true,
            Slot::Empty => false,
        };
        *slot = Slot::Value(value);
        drop(slot);

        self.notify.notify_one();
        superseded
    }

    /// Put back a value the receiver did not take, unless something newer arrived
    fn restore(&self, value: T) {
        let mut slot = self.lock();
        if matches!(*slot, Slot::Empty) {
            *slot = Slot::Value(value);
        }
    }

    /// Mark closed; a pending value is dropped
    fn close(&self) {
        *self.lock() = Slot::Closed;
        self.notify.notify_one();
    }

    /// Take the pending value, leaving the slot empty. Closed stays closed.
    fn take(&self) -> Slot<T> {
        let mut slot = self.lock();
        match *slot {
            Slot::Closed => Slot::Closed,
            _ => std::mem::replace(&mut *slot, Slot::Empty),
        }
    }

    /// Wait for a value; None once closed
    async fn next(&self) -> Option<T> {
        loop {
            match self.take() {
                Slot::Value(value) => return Some(value),
                Slot::Closed => return None,
                Slot::Empty => self.notify.notified().await,
            }
        }
    }

    /// Wait until closed, leaving any pending value in place
    async fn closed(&self) {
        loop {
            let closed = matches!(*self.lock(), Slot::Closed);
            if closed {
                return;
            }
            self.notify.notified().await;
        }
    }

    // Every mutation is a single assignment, so a poisoned slot is still coherent.
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Input handle of a latest-value relay
///
/// Values passed to [`Feed::submit`] are delivered to the sink the feed was
/// created with, newest first and without queueing: a value that is replaced
/// before the consumer receives it is never delivered. Delivery order per feed
/// is monotonic with respect to submission order.
///
/// The handle is the single owner of the worker. [`Feed::close`] and
/// [`Feed::shutdown`] consume it, and dropping it closes the feed as well. The
/// sink itself is never closed by the feed.
pub struct Feed<T> {
    mailbox: Arc<Mailbox<T>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Feed<T> {
    /// Start a relay that delivers into `sink`
    ///
    /// Spawns the worker on the current tokio runtime, so this must be called
    /// from within one.
    pub fn new(sink: Sink<T>) -> Self {
        debug!("Feed::new: spawning worker");
        let mailbox = Arc::new(Mailbox::new());
        let worker = tokio::spawn(run(mailbox.clone(), sink));
        Self {
            mailbox,
            worker: Some(worker),
        }
    }
}

impl<T> Feed<T> {
    /// Hand a value to the worker
    ///
    /// Never waits on the consumer. A value still pending from an earlier
    /// submission is discarded.
    pub fn submit(&self, value: T) {
        let superseded = self.mailbox.put(value);
        trace!(superseded, "Feed::submit");
    }

    /// Terminate the worker without waiting for it to exit
    pub fn close(self) {
        debug!("Feed::close: called");
        drop(self);
    }

    /// Terminate the worker and wait until it has exited
    ///
    /// Once this returns nothing more is delivered to the sink.
    pub async fn shutdown(mut self) -> Result<(), FeedError> {
        debug!("Feed::shutdown: called");
        self.mailbox.close();
        if let Some(worker) = self.worker.take() {
            worker.await?;
        }
        debug!("Feed::shutdown: worker exited");
        Ok(())
    }

    /// Whether the worker task has exited
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl<T> Drop for Feed<T> {
    fn drop(&mut self) {
        trace!("Feed::drop: closing mailbox");
        self.mailbox.close();
    }
}

impl<T> fmt::Debug for Feed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed").field("finished", &self.is_finished()).finish()
    }
}

/// Worker loop
///
/// Waits for a receive request first and only then takes from the mailbox.
/// The handover through the request's reply channel is synchronous, so a value
/// is either delivered on the spot or stays in the mailbox where newer
/// submissions replace it.
async fn run<T: Send>(mailbox: Arc<Mailbox<T>>, sink: Sink<T>) {
    debug!("Feed worker: started");

    loop {
        // await receiver
        let demand = tokio::select! {
            biased;

            _ = mailbox.closed() => break,
            demand = sink.demand() => demand,
        };
        let Some(waiter) = demand else {
            debug!("Feed worker: listener gone, idle until closed");
            mailbox.closed().await;
            break;
        };

        // await update
        let Some(value) = mailbox.next().await else {
            break;
        };
        match waiter.send(value) {
            Ok(()) => trace!("Feed worker: update delivered"),
            Err(value) => {
                trace!("Feed worker: receiver left, keeping update");
                mailbox.restore(value);
            }
        }
    }

    debug!("Feed worker: closed");
}
