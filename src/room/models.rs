use serde::{Deserialize, Serialize};

/// A named partition of the message feed
///
/// Rooms are static configuration; they are never written to the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

impl Room {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
        }
    }

    /// Rooms shipped with the widget when no catalog file is configured
    pub fn defaults() -> Vec<Room> {
        vec![
            Room::new("general", "General", "Talk about anything"),
            Room::new("random", "Random", "Off-topic chatter"),
            Room::new("help", "Help", "Ask questions and get support"),
        ]
    }
}
