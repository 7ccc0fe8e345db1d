//! Adapter Layer
//!
//! - **ffi**: C-ABI connection callback used by native transports
//! - **loopback**: In-process transport for embedding and tests

pub mod ffi;
pub mod loopback;
