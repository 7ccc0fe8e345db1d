//! Registry Module
//!
//! Thread-safe handle registry that packs long-lived Rust objects into opaque,
//! pointer-sized handles for native callbacks, and unpacks them again.
//! DashMap-backed so native callback threads can resolve concurrently with
//! registration and revocation on the control thread.

mod types;

// Re-export registry types at module level
pub use types::{Handle, HandleAllocator, HandleRegistry};
