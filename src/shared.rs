use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::Generation;

/// Errors surfaced by the room feed controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthenticated: sign in to send messages")]
    Unauthenticated,

    #[error("Unknown room: {0}")]
    UnknownRoom(String),

    #[error("No active room")]
    NoActiveRoom,

    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Internal only; batches from a cancelled generation are dropped
    #[error("Stale delivery discarded (generation {received}, active {active:?})")]
    StaleDelivery {
        received: Generation,
        active: Option<Generation>,
    },
}

/// Kind of failure reported through `RenderSurface::on_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Subscription,
    Send,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Subscription => write!(f, "subscription"),
            ErrorKind::Send => write!(f, "send"),
        }
    }
}
