use serde::{Deserialize, Serialize};

/// The authenticated user as seen by the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,    // Opaque user id from the auth backend
    pub label: String, // Display label stamped on outgoing messages
}

impl Identity {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Signed-in / signed-out transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthChange {
    SignedIn(Identity),
    SignedOut,
}
