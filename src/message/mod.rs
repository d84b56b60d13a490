// Public API - what other modules can use
pub use models::{Change, ChangeKind, Message, MessageId, NewMessage};
pub use validation::validate_text;

// Internal modules
mod models;
mod validation;
