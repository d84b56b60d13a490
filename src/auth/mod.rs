// Public API - what other modules can use
pub use models::{AuthChange, Identity};
pub use provider::{AuthError, AuthProvider, InMemoryAuthProvider, MIN_PASSWORD_LEN};

// Internal modules
mod models;
mod provider;
