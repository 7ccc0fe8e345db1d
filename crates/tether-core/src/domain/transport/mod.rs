//! Transport Domain
//!
//! Outbound interface from the listener bridge to a native, callback-driven
//! transport. The bridge never talks to sockets itself; it hands the transport
//! a parameter structure, a raw address buffer, and a callback descriptor, and
//! later asks it to accept, reject, query, or tear things down.
//!
//! ## Ownership Rules
//!
//! - The raw address buffer passed to [`NativeTransport::create_listener`] belongs
//!   to the transport once creation succeeds. On failure it is handed back inside
//!   [`NativeCreateError`].
//! - [`NativeTransport::destroy_listener`] returns the address buffer if the
//!   transport still holds it, so the caller can release it exactly once.
//! - A connection request handle is consumed by exactly one `accept` or `reject`.

use crate::error::{TetherError, TetherResult};
use crate::infrastructure::abi::{FfiBuffer, FfiListenerParams};
use std::ffi::c_void;
use std::fmt;

/// Native listener resource handle
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeListenerId(pub u64);

/// Native endpoint handle produced by accepting a connection request
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeEndpointId(pub u64);

/// Native connection request handle
///
/// Arrives as the first argument of the connection callback. Stored as a
/// pointer-sized integer so it can be moved between threads; it is never
/// dereferenced on the Rust side.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeConnRequest(usize);

impl NativeConnRequest {
    /// Wrap the raw handle received from the transport
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    /// Raw handle as the transport expects it
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    /// Raw handle value
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// Check for the null handle
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NativeConnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_request@{:#x}", self.0)
    }
}

/// Failed listener creation
///
/// Returns ownership of the address buffer to the caller so it can be
/// released on the Rust side.
#[derive(Debug)]
pub struct NativeCreateError {
    /// Why the transport refused
    pub code: TetherError,
    /// Address buffer handed back unchanged
    pub address: FfiBuffer,
}

impl NativeCreateError {
    /// Build a creation failure that returns `address` to the caller
    pub fn new(code: TetherError, address: FfiBuffer) -> Self {
        Self { code, address }
    }
}

/// Contract for native listener implementations
///
/// Implementations are driven from a single control thread for
/// create/destroy, but their connection callbacks may fire on any thread,
/// including concurrently with `destroy_listener`.
///
/// No method may block; every call is expected to complete quickly.
pub trait NativeTransport: Send + Sync + fmt::Debug {
    /// Create a listener resource
    ///
    /// `params.sockaddr` points into `address`. On success the transport owns
    /// `address` and must keep it alive until `destroy_listener`. Once this
    /// returns `Ok`, the transport may start invoking `params.conn_handler`.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: field mask and members disagree
    /// - `NativeCreateFailed`: the resource could not be created
    fn create_listener(
        &self,
        params: &FfiListenerParams,
        address: FfiBuffer,
    ) -> Result<NativeListenerId, NativeCreateError>;

    /// Destroy a listener resource
    ///
    /// After this returns `Ok`, the transport must not invoke the listener's
    /// callback again. Returns the address buffer if it is still owned by the
    /// transport. On error the listener is left as it was and the call may be
    /// repeated.
    ///
    /// # Errors
    ///
    /// - `UnknownListener`: handle not found (already destroyed or never existed)
    fn destroy_listener(&self, listener: NativeListenerId) -> TetherResult<Option<FfiBuffer>>;

    /// Raw sockaddr bytes the listener is bound to
    fn query_listener(&self, listener: NativeListenerId) -> TetherResult<Vec<u8>>;

    /// Raw sockaddr bytes of the peer behind a pending connection request
    fn query_conn_request(&self, request: NativeConnRequest) -> TetherResult<Vec<u8>>;

    /// Accept a pending request, creating a new endpoint
    ///
    /// On error the request stays pending and must still be rejected.
    ///
    /// # Errors
    ///
    /// - `UnknownConnRequest`: request not pending (consumed or never issued)
    fn accept(&self, request: NativeConnRequest) -> TetherResult<NativeEndpointId>;

    /// Reject a pending request, releasing its native resources
    ///
    /// On error the request stays pending.
    ///
    /// # Errors
    ///
    /// - `UnknownConnRequest`: request not pending (consumed or never issued)
    fn reject(&self, request: NativeConnRequest) -> TetherResult<()>;

    /// Close an endpoint produced by `accept`
    fn close_endpoint(&self, endpoint: NativeEndpointId) -> TetherResult<()>;
}
