//! Infrastructure Layer
//!
//! Low-level pieces the listener bridge is built on.
//!
//! - **registry**: Handle registry packing Rust objects into opaque callback contexts
//! - **ffi**: Address conversion to and from raw sockaddr buffers
//! - **runtime**: Process-wide registry instance and dropped-callback counter

pub mod ffi;
pub mod registry;
pub mod runtime;
