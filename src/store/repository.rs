use async_trait::async_trait;
use thiserror::Error;

use super::subscription::{BatchSink, CancelHandle, LiveQuery};
use crate::message::{MessageId, NewMessage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Append-only message collection with live queries
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Writes a record; the store assigns the id and the server timestamp
    async fn insert(&self, record: NewMessage) -> Result<MessageId, StoreError>;

    /// Starts a live query. The initial batch and every later change go to `sink`
    /// until the returned handle is cancelled.
    fn subscribe(&self, query: LiveQuery, sink: BatchSink) -> Result<CancelHandle, StoreError>;
}
