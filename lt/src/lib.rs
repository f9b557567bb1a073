//! latest - keep track of a current version
//!
//! Latest-value notification for in-process signaling ("configuration
//! changed", "new snapshot ready") where consumers only care about the most
//! recent state. A slow consumer never blocks producers and never receives a
//! backlog: values superseded before delivery are dropped.
//!
//! # Modules
//!
//! - [`feed`] - single-subscriber relay delivering the latest value to one sink
//! - [`broadcast`] - publish/subscribe hub running one feed per subscriber
//! - [`sink`] - the caller-owned delivery target
//! - [`config`], [`cli`], [`demo`] - the `lt` demo binary
//!
//! # Example
//!
//! ```rust,no_run
//! use latest::{Broadcast, sink};
//!
//! # async fn example() {
//! let broadcast = Broadcast::new();
//! let (tx, rx) = sink();
//! broadcast.subscribe(tx);
//!
//! broadcast.update("1st update");
//! broadcast.update("2nd update");
//! assert_eq!(rx.recv().await.unwrap(), "2nd update");
//!
//! broadcast.unsubscribe_all().await;
//! # }
//! ```

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod feed;
pub mod sink;

pub use broadcast::Broadcast;
pub use error::{FeedError, RecvError};
pub use feed::Feed;
pub use sink::{Listener, Sink, sink};
