use tracing::debug;

use super::models::Room;
use crate::config::ConfigError;

/// The fixed set of rooms a controller may activate
#[derive(Debug, Clone)]
pub struct RoomCatalog {
    rooms: Vec<Room>,
    default_room: String,
}

impl RoomCatalog {
    /// Builds a catalog, rejecting empty sets, duplicate ids and an unknown default
    pub fn new(rooms: Vec<Room>, default_room: Option<String>) -> Result<Self, ConfigError> {
        let first = rooms
            .first()
            .ok_or_else(|| ConfigError::Invalid("room catalog is empty".to_string()))?
            .id
            .clone();

        for (index, room) in rooms.iter().enumerate() {
            if room.id.trim().is_empty() {
                return Err(ConfigError::Invalid("room id must not be empty".to_string()));
            }
            if rooms[..index].iter().any(|r| r.id == room.id) {
                return Err(ConfigError::Invalid(format!("duplicate room id: {}", room.id)));
            }
        }

        let default_room = default_room.unwrap_or(first);
        if !rooms.iter().any(|r| r.id == default_room) {
            return Err(ConfigError::Invalid(format!(
                "default room {} is not in the catalog",
                default_room
            )));
        }

        debug!(room_count = rooms.len(), default_room = %default_room, "Room catalog built");

        Ok(Self {
            rooms,
            default_room,
        })
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.get(room_id).is_some()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn default_room(&self) -> &str {
        &self.default_room
    }
}

impl Default for RoomCatalog {
    fn default() -> Self {
        Self {
            rooms: Room::defaults(),
            default_room: "general".to_string(),
        }
    }
}
