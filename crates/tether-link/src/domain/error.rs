//! Domain Model: Listener Error Types
//!
//! Errors returned synchronously to whoever called the operation. Failures
//! inside the native callback path never reach this type; they are absorbed
//! by the trampoline.

use tether_core::{NativeConnRequest, TetherError};

/// Listener bridge errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    /// Address family other than IPv4/IPv6
    #[error("Unsupported address family: {0}")]
    UnsupportedFamily(String),

    /// Address text or raw bytes could not be interpreted
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    /// Declarative settings could not be parsed
    #[error("Invalid listener settings: {0}")]
    InvalidSettings(String),

    /// Listener creation attempted without an address
    #[error("Listener address not set")]
    MissingAddress,

    /// Native transport refused to create the listener
    #[error("Native listener creation failed: {0}")]
    NativeCreateFailed(TetherError),

    /// Connection request was already accepted or rejected
    #[error("Connection request {0} already consumed")]
    AlreadyConsumed(NativeConnRequest),

    /// Operation on a closed listener
    #[error("Listener closed")]
    ListenerClosed,

    /// Any other failure reported by the native transport
    #[error("Native transport error: {0}")]
    Native(TetherError),
}

impl ListenerError {
    /// Map to the FFI error code
    pub fn code(&self) -> TetherError {
        match self {
            ListenerError::UnsupportedFamily(_) => TetherError::UnsupportedFamily,
            ListenerError::InvalidAddress(_) | ListenerError::InvalidSettings(_) => {
                TetherError::InvalidRequest
            }
            ListenerError::MissingAddress => TetherError::MissingAddress,
            ListenerError::NativeCreateFailed(_) => TetherError::NativeCreateFailed,
            ListenerError::AlreadyConsumed(_) => TetherError::AlreadyConsumed,
            ListenerError::ListenerClosed => TetherError::ListenerClosed,
            ListenerError::Native(code) => *code,
        }
    }
}

impl From<TetherError> for ListenerError {
    fn from(code: TetherError) -> Self {
        match code {
            TetherError::UnsupportedFamily => {
                ListenerError::UnsupportedFamily(code.message().to_string())
            }
            TetherError::MissingAddress => ListenerError::MissingAddress,
            TetherError::ListenerClosed => ListenerError::ListenerClosed,
            other => ListenerError::Native(other),
        }
    }
}

/// Result alias for listener operations
pub type ListenerResult<T> = Result<T, ListenerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_void;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(ListenerError::MissingAddress.code(), TetherError::MissingAddress);
        assert_eq!(
            ListenerError::UnsupportedFamily("unix".into()).code(),
            TetherError::UnsupportedFamily
        );
        assert_eq!(
            ListenerError::NativeCreateFailed(TetherError::Internal).code(),
            TetherError::NativeCreateFailed
        );
        let request = NativeConnRequest::from_ptr(0x20usize as *mut c_void);
        assert_eq!(
            ListenerError::AlreadyConsumed(request).code(),
            TetherError::AlreadyConsumed
        );
    }

    #[test]
    fn from_native_code() {
        assert_eq!(
            ListenerError::from(TetherError::UnknownConnRequest),
            ListenerError::Native(TetherError::UnknownConnRequest)
        );
        assert_eq!(
            ListenerError::from(TetherError::MissingAddress),
            ListenerError::MissingAddress
        );
    }

    #[test]
    fn display_mentions_request() {
        let request = NativeConnRequest::from_ptr(0x20usize as *mut c_void);
        let text = ListenerError::AlreadyConsumed(request).to_string();
        assert_eq!(text, "Connection request conn_request@0x20 already consumed");
    }
}
