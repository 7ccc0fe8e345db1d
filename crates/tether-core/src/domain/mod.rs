//! Domain Layer
//!
//! Contracts between the listener bridge and the native transport it drives.
//!
//! - **transport**: Outbound interface to the native listener implementation

pub mod transport;

pub use transport::{
    NativeConnRequest, NativeCreateError, NativeEndpointId, NativeListenerId, NativeTransport,
};
