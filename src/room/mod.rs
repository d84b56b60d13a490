// Public API - what other modules can use
pub use catalog::RoomCatalog;
pub use models::Room;

// Internal modules
mod catalog;
mod models;
