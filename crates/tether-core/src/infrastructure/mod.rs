//! # Infrastructure Layer
//!
//! Memory layouts that cross the native boundary unchanged.
//!
//! ## Module Organization
//!
//! - `abi`: `#[repr(C)]` parameter structures and owned buffers

pub mod abi;
