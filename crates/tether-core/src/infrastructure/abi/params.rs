//! # Listener Parameters
//!
//! FFI-safe parameter structure handed to the native transport when a
//! listener is created. Mirrors the native layout: a field mask telling the
//! transport which members are populated, a raw socket address, and a
//! connection-handler descriptor (callback pointer + opaque context).

use std::ffi::c_void;

/// Native connection callback signature
///
/// Invoked by the transport for every inbound connection request with the
/// native request handle and the opaque `arg` registered in [`FfiConnHandler`].
pub type FfiConnCallback = unsafe extern "C" fn(conn_request: *mut c_void, arg: *mut c_void);

/// Field mask tags for [`FfiListenerParams`]
///
/// A member of the parameter structure may only be read by the transport if
/// its tag is present in `field_mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerParamField;

impl ListenerParamField {
    /// `sockaddr` is populated
    pub const SOCK_ADDR: u64 = 1 << 0;
    /// `conn_handler` is populated (bit 1 is the native accept-handler tag, never set here)
    pub const CONN_HANDLER: u64 = 1 << 2;
}

/// Raw socket address reference
///
/// Points at a `sockaddr_in`/`sockaddr_in6` image of `addrlen` bytes.
///
/// **Memory Layout (16 bytes on 64-bit)**:
/// - Offset 0: `addr` (pointer, 8 bytes)
/// - Offset 8: `addrlen` (u32, 4 bytes)
/// - Offset 12: `_padding` (u32, 4 bytes)
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy)]
pub struct FfiSockAddr {
    /// Pointer to the raw sockaddr bytes
    pub addr: *const u8,
    /// Length of the sockaddr image in bytes
    pub addrlen: u32,
    /// Padding for alignment
    pub _padding: u32,
}

impl FfiSockAddr {
    /// Create an empty (null) address reference
    pub const fn new() -> Self {
        Self {
            addr: std::ptr::null(),
            addrlen: 0,
            _padding: 0,
        }
    }

    /// Verify the reference is populated
    pub fn is_valid(&self) -> bool {
        !self.addr.is_null() && self.addrlen > 0
    }
}

impl Default for FfiSockAddr {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection handler descriptor
///
/// `arg` is an opaque pointer-sized token. The transport never dereferences
/// it; it only hands it back to `cb`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiConnHandler {
    /// Fixed callback invoked per connection request
    pub cb: Option<FfiConnCallback>,
    /// Opaque context passed back to `cb`
    pub arg: *mut c_void,
}

impl FfiConnHandler {
    /// Create an empty handler descriptor
    pub const fn new() -> Self {
        Self {
            cb: None,
            arg: std::ptr::null_mut(),
        }
    }

    /// Invoke the callback, if any
    ///
    /// # Safety
    /// `conn_request` must be a handle the callback is prepared to receive.
    pub unsafe fn invoke(&self, conn_request: *mut c_void) -> bool {
        match self.cb {
            Some(cb) => {
                // SAFETY: forwarded caller contract
                unsafe { cb(conn_request, self.arg) };
                true
            }
            None => false,
        }
    }
}

impl Default for FfiConnHandler {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: `arg` is an opaque token that is never dereferenced by the holder of
// the descriptor, and `cb` is a plain function pointer.
unsafe impl Send for FfiConnHandler {}
unsafe impl Sync for FfiConnHandler {}

/// Listener creation parameters
///
/// **Memory Layout (40 bytes on 64-bit, 8-byte aligned)**:
/// - Offset 0: `field_mask` (u64, 8 bytes)
/// - Offset 8: `sockaddr` (FfiSockAddr, 16 bytes)
/// - Offset 24: `conn_handler` (FfiConnHandler, 16 bytes)
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy)]
pub struct FfiListenerParams {
    /// Which of the members below are populated
    pub field_mask: u64,
    /// Address to listen on
    pub sockaddr: FfiSockAddr,
    /// Per-request callback
    pub conn_handler: FfiConnHandler,
}

impl FfiListenerParams {
    /// Create an empty parameter set
    pub const fn new() -> Self {
        Self {
            field_mask: 0,
            sockaddr: FfiSockAddr::new(),
            conn_handler: FfiConnHandler::new(),
        }
    }

    /// Check whether a field tag is set
    pub fn has_field(&self, field: u64) -> bool {
        self.field_mask & field == field
    }

    /// Verify every tagged member is actually populated
    ///
    /// Untagged members are ignored, whatever they contain.
    pub fn is_valid(&self) -> bool {
        if !self.has_field(ListenerParamField::SOCK_ADDR) {
            return false;
        }
        if !self.sockaddr.is_valid() {
            return false;
        }
        if self.has_field(ListenerParamField::CONN_HANDLER) && self.conn_handler.cb.is_none() {
            return false;
        }
        true
    }
}

impl Default for FfiListenerParams {
    fn default() -> Self {
        Self::new()
    }
}
