// Library crate for the room-scoped live chat feed
// This file exposes the public API for integration tests and the console shell

pub mod auth;
pub mod config;
pub mod feed;
pub mod message;
pub mod room;
pub mod shared;
pub mod store;

// Re-export commonly used types for easier access in tests
pub use auth::{AuthChange, AuthProvider, Identity, InMemoryAuthProvider};
pub use config::FeedConfig;
pub use feed::{FeedEvent, Generation, MessageView, RenderSurface, RoomFeedController};
pub use message::{Change, ChangeKind, Message, MessageId, NewMessage};
pub use room::{Room, RoomCatalog};
pub use shared::{ErrorKind, FeedError};
pub use store::{InMemoryMessageStore, MessageStore};
