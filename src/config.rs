use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use chrono::FixedOffset;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::room::{Room, RoomCatalog};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a room feed controller
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// How many of the most recent messages a live query asks for and the view keeps
    pub message_limit: usize,
    /// Longest accepted message, in characters, after trimming
    pub max_message_chars: usize,
    /// chrono format string for confirmed timestamps
    pub time_format: String,
    /// Label shown while the server timestamp is still pending
    pub unconfirmed_label: String,
    /// Offset applied to timestamps before formatting
    pub utc_offset_minutes: i32,
    pub rooms: RoomCatalog,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            message_limit: 100,
            max_message_chars: 500,
            time_format: "%H:%M".to_string(),
            unconfirmed_label: "Just now".to_string(),
            utc_offset_minutes: 0,
            rooms: RoomCatalog::default(),
        }
    }
}

impl FeedConfig {
    /// Builds the config from `ROOMFEED_*` environment variables, falling back to defaults
    #[instrument]
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let message_limit = env_parse("ROOMFEED_MESSAGE_LIMIT").unwrap_or(defaults.message_limit);
        let max_message_chars =
            env_parse("ROOMFEED_MAX_MESSAGE_CHARS").unwrap_or(defaults.max_message_chars);
        let utc_offset_minutes =
            env_parse("ROOMFEED_UTC_OFFSET_MINUTES").unwrap_or(defaults.utc_offset_minutes);
        let time_format =
            std::env::var("ROOMFEED_TIME_FORMAT").unwrap_or(defaults.time_format);
        let unconfirmed_label =
            std::env::var("ROOMFEED_UNCONFIRMED_LABEL").unwrap_or(defaults.unconfirmed_label);
        let default_room = std::env::var("ROOMFEED_DEFAULT_ROOM").ok();

        let rooms = match std::env::var("ROOMFEED_ROOMS_FILE") {
            Ok(path) => {
                info!(path = %path, "Loading room catalog from file");
                RoomCatalog::new(load_rooms(Path::new(&path))?, default_room)?
            }
            Err(_) => RoomCatalog::new(Room::defaults(), default_room)?,
        };

        let config = Self {
            message_limit,
            max_message_chars,
            time_format,
            unconfirmed_label,
            utc_offset_minutes,
            rooms,
        };
        config.validate()?;

        debug!(
            message_limit = config.message_limit,
            max_message_chars = config.max_message_chars,
            room_count = config.rooms.rooms().len(),
            "Feed configuration loaded"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.message_limit == 0 {
            return Err(ConfigError::Invalid(
                "message limit must be positive".to_string(),
            ));
        }
        if self.max_message_chars == 0 {
            return Err(ConfigError::Invalid(
                "max message length must be positive".to_string(),
            ));
        }
        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Invalid(format!(
                "invalid time format: {}",
                self.time_format
            )));
        }
        self.utc_offset()?;
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "utc offset out of range: {} minutes",
                    self.utc_offset_minutes
                ))
            })
    }
}

/// Reads a JSON array of rooms
pub fn load_rooms(path: &Path) -> Result<Vec<Room>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let rooms: Vec<Room> = serde_json::from_str(&raw)?;
    Ok(rooms)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
