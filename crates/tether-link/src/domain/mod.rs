//! Domain Layer
//!
//! Listener-side data structures: lifecycle state, statistics snapshots,
//! query attributes, and the error taxonomy.

pub mod error;
pub mod types;

// Re-export domain types at module level
pub use error::{ListenerError, ListenerResult};
pub use types::{ConnRequestAttributes, ListenerAttributes, ListenerState, ListenerStats};
