// Message store seam
//
// The controller only talks to a `MessageStore`; `InMemoryMessageStore` is the
// reference backend used by the console shell and the tests.

// Public API - what other modules can use
pub use memory::InMemoryMessageStore;
pub use repository::{MessageStore, StoreError};
pub use subscription::{BatchSink, CancelHandle, LiveQuery};

// Internal modules
mod memory;
mod repository;
mod subscription;
