//! # Tether Core
//!
//! Shared contract between the listener bridge and a native, callback-driven
//! transport. Defines the `#[repr(C)]` parameter layout, FFI error codes, and
//! the trait the bridge uses to talk to the transport.
//!
//! ## Module Organization
//!
//! - `infrastructure::abi`: FFI-safe memory layouts
//! - `domain::transport`: Native transport contract and opaque native handles
//! - `error`: Error codes that cross the boundary

pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-export commonly used types
pub use domain::transport::{
    NativeConnRequest, NativeCreateError, NativeEndpointId, NativeListenerId, NativeTransport,
};
pub use error::{TetherError, TetherResult};
pub use infrastructure::abi::{
    FfiBuffer, FfiConnCallback, FfiConnHandler, FfiListenerParams, FfiSockAddr,
    ListenerParamField,
};

/// Library version
pub const TETHER_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
