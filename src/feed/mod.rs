// Room feed
//
// The controller owns the active room's live query, switches rooms, and turns
// store changes into view models for a render surface.

// Public API - what other modules can use
pub use controller::RoomFeedController;
pub use events::{FeedEvent, Generation};
pub use surface::RenderSurface;
pub use view::{MessageView, ViewFormatter};

// Internal modules
mod controller;
mod events;
mod surface;
mod view;
