use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, FeedConfig};
use crate::message::{Message, MessageId};

/// Display-ready message for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: MessageId,
    pub author_label: String,
    pub text: String,
    pub time_label: String,
    pub is_own_message: bool,
}

/// Turns stored messages into view models
#[derive(Debug, Clone)]
pub struct ViewFormatter {
    time_format: String,
    unconfirmed_label: String,
    offset: FixedOffset,
}

impl ViewFormatter {
    pub fn from_config(config: &FeedConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            time_format: config.time_format.clone(),
            unconfirmed_label: config.unconfirmed_label.clone(),
            offset: config.utc_offset()?,
        })
    }

    pub fn time_label(&self, created_at: Option<DateTime<Utc>>) -> String {
        let Some(created_at) = created_at else {
            return self.unconfirmed_label.clone();
        };

        let local = created_at.with_timezone(&self.offset);
        let mut label = String::new();
        if write!(label, "{}", local.format(&self.time_format)).is_err() {
            label = local.to_rfc3339();
        }
        label
    }

    /// `viewer_id` is the signed-in user, if any
    pub fn view(&self, message: &Message, viewer_id: Option<&str>) -> MessageView {
        MessageView {
            id: message.id.clone(),
            author_label: message.author_label.clone(),
            text: message.text.clone(),
            time_label: self.time_label(message.created_at),
            is_own_message: viewer_id == Some(message.author_id.as_str()),
        }
    }
}
