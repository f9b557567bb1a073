//! Feed and sink error types

use thiserror::Error;

/// Errors surfaced when tearing down a feed
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Receive failed because every sender of the sink is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Sink disconnected")]
pub struct RecvError;
