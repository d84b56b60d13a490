use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::Change;

/// Tag distinguishing successive subscriptions of one controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything collaborators report back to the controller
///
/// Events are queued on the controller's inbox and applied one at a time by
/// whoever owns the controller.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A change batch from the live query of `generation`
    Batch {
        generation: Generation,
        changes: Vec<Change>,
    },

    /// The live query of `generation` failed and will deliver nothing more
    SubscriptionFailed {
        generation: Generation,
        detail: String,
    },

    /// A fire-and-forget insert was refused by the store
    SendFailed { detail: String },
}

impl FeedEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            FeedEvent::Batch { .. } => "batch",
            FeedEvent::SubscriptionFailed { .. } => "subscription_failed",
            FeedEvent::SendFailed { .. } => "send_failed",
        }
    }
}
