//! # Listener Bridge ABI
//!
//! Low-level memory layout definitions shared with the native transport.
//! All structures use `#[repr(C)]` with explicit alignment for ABI stability.
//!
//! ## Module Organization
//!
//! - `primitives`: Owned byte buffers (`FfiBuffer`)
//! - `params`: Listener creation parameters, field-mask tags and the
//!   connection callback descriptor

pub mod params;
pub mod primitives;

// Re-export all ABI types at module level
pub use params::{
    FfiConnCallback, FfiConnHandler, FfiListenerParams, FfiSockAddr, ListenerParamField,
};
pub use primitives::FfiBuffer;
