use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::feed::{FeedEvent, Generation};
use crate::message::Change;

/// Filter, order and window of a live query
///
/// Results are always ordered by `created_at` ascending; unconfirmed records sort last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveQuery {
    pub room_id: String,
    /// Only the most recent `limit` records are part of the initial batch
    pub limit: usize,
}

impl LiveQuery {
    pub fn for_room(room_id: impl Into<String>, limit: usize) -> Self {
        Self {
            room_id: room_id.into(),
            limit,
        }
    }
}

/// Delivery end of a live query, tagged with the generation it belongs to
#[derive(Debug, Clone)]
pub struct BatchSink {
    generation: Generation,
    sender: mpsc::UnboundedSender<FeedEvent>,
}

impl BatchSink {
    pub fn new(generation: Generation, sender: mpsc::UnboundedSender<FeedEvent>) -> Self {
        Self { generation, sender }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns false once the receiving controller is gone
    pub fn deliver(&self, changes: Vec<Change>) -> bool {
        let event = FeedEvent::Batch {
            generation: self.generation,
            changes,
        };
        self.sender.send(event).is_ok()
    }

    pub fn fail(&self, detail: impl Into<String>) -> bool {
        let event = FeedEvent::SubscriptionFailed {
            generation: self.generation,
            detail: detail.into(),
        };
        self.sender.send(event).is_ok()
    }
}

/// Single-use handle that detaches a live listener
pub struct CancelHandle {
    cancel: Box<dyn FnOnce() + Send>,
}

impl CancelHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Cancelling aborts the task driving the query
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self::new(move || task.abort())
    }

    pub fn cancel(self) {
        debug!("Cancelling live query");
        (self.cancel)()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}
