use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier assigned by the message store on insert
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A chat message as held by the store; immutable once written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: String,
    pub author_id: String,
    pub author_label: String,
    pub text: String,
    /// Server timestamp; `None` until the store confirms the write
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_confirmed(&self) -> bool {
        self.created_at.is_some()
    }
}

/// Insert payload; the store assigns the id and resolves the timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub room_id: String,
    pub author_id: String,
    pub author_label: String,
    pub text: String,
}

impl NewMessage {
    /// Materializes the stored record
    pub fn into_message(self, id: MessageId, created_at: Option<DateTime<Utc>>) -> Message {
        Message {
            id,
            room_id: self.room_id,
            author_id: self.author_id,
            author_label: self.author_label,
            text: self.text,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One incremental notification from a live query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub message: Message,
}

impl Change {
    pub fn added(message: Message) -> Self {
        Self {
            kind: ChangeKind::Added,
            message,
        }
    }

    pub fn modified(message: Message) -> Self {
        Self {
            kind: ChangeKind::Modified,
            message,
        }
    }

    pub fn removed(message: Message) -> Self {
        Self {
            kind: ChangeKind::Removed,
            message,
        }
    }
}
