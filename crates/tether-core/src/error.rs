//! # Unified Error Codes
//!
//! Error codes exchanged with the native transport layer.
//! All codes are FFI-compatible (u32) so they can be returned from and passed
//! to `extern "C"` functions without translation.

use std::fmt;

/// Tether error codes for the native boundary
///
/// `#[repr(u32)]` ensures compatibility with C callers. Codes are grouped by
/// the stage of the listener lifecycle that produces them.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TetherError {
    /// Successful operation
    Success = 0,

    // === Internal Errors (1000-1099) ===
    /// Generic internal error (panic recovery, unrecoverable state)
    Internal = 1000,
    /// Pointer validation failed (null, misaligned, dangling)
    InvalidPointer = 1001,
    /// Parameter structure is malformed (inconsistent field mask, bad lengths)
    InvalidRequest = 1002,

    // === Address Errors (2000-2099) ===
    /// Address family is neither IPv4 nor IPv6
    UnsupportedFamily = 2000,
    /// Listener parameters carry no socket address
    MissingAddress = 2001,

    // === Listener Errors (3000-3099) ===
    /// Native layer refused to create the listener resource
    NativeCreateFailed = 3000,
    /// Native listener handle does not name a live listener
    UnknownListener = 3001,
    /// Listener has already been closed
    ListenerClosed = 3002,

    // === Connection Request Errors (4000-4099) ===
    /// Connection request was already accepted or rejected
    AlreadyConsumed = 4000,
    /// Native connection request handle is not pending
    UnknownConnRequest = 4001,

    // === Callback Errors (5000-5099) ===
    /// Opaque callback context did not resolve to a live object (never surfaced to users)
    HandleResolutionFailed = 5000,
}

impl TetherError {
    /// Convert error code back to enum variant (lossy for unknown codes)
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => TetherError::Success,
            1000 => TetherError::Internal,
            1001 => TetherError::InvalidPointer,
            1002 => TetherError::InvalidRequest,
            2000 => TetherError::UnsupportedFamily,
            2001 => TetherError::MissingAddress,
            3000 => TetherError::NativeCreateFailed,
            3001 => TetherError::UnknownListener,
            3002 => TetherError::ListenerClosed,
            4000 => TetherError::AlreadyConsumed,
            4001 => TetherError::UnknownConnRequest,
            5000 => TetherError::HandleResolutionFailed,
            _ => TetherError::Internal,
        }
    }

    /// Numeric code as passed across the native boundary
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Get human-readable error message
    pub fn message(&self) -> &'static str {
        match self {
            TetherError::Success => "Success",
            TetherError::Internal => "Internal error",
            TetherError::InvalidPointer => "Invalid pointer",
            TetherError::InvalidRequest => "Invalid request",
            TetherError::UnsupportedFamily => "Unsupported address family",
            TetherError::MissingAddress => "Listener address not set",
            TetherError::NativeCreateFailed => "Native listener creation failed",
            TetherError::UnknownListener => "Unknown listener",
            TetherError::ListenerClosed => "Listener closed",
            TetherError::AlreadyConsumed => "Connection request already consumed",
            TetherError::UnknownConnRequest => "Unknown connection request",
            TetherError::HandleResolutionFailed => "Callback handle resolution failed",
        }
    }

    /// Check if the caller may reasonably retry the failed operation
    ///
    /// Nothing in the listener bridge retries on its own; this only informs
    /// whoever called listener creation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TetherError::NativeCreateFailed)
    }
}

impl fmt::Display for TetherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TetherError::{:?} ({}): {}",
            self,
            *self as u32,
            self.message()
        )
    }
}

impl std::error::Error for TetherError {}

/// Result type for native-boundary operations
pub type TetherResult<T> = Result<T, TetherError>;
