//! FFI Adapter Layer
//!
//! The single C-ABI entry point the native transport calls back into.
//! Uses the `extern "C"` calling convention and panic-safe wrapping: nothing
//! inside may unwind across the boundary, and nothing is reported back to
//! the caller, which has no way to receive an error.

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tether_core::{NativeConnRequest, TetherError};
use tracing::{debug, error};

use crate::infrastructure::runtime::{get_registry, record_dropped_callback};

/// Connection callback handed to the native transport
///
/// Resolves `arg` through the listener registry and forwards the request to
/// that listener's handler. An `arg` that no longer resolves (the listener
/// was closed while the callback was in flight) or never did (forged or
/// corrupted context) drops the request silently and bumps
/// [`crate::dropped_callbacks`].
///
/// # Safety
/// * `conn_request` must be a request handle issued by the transport that
///   received `arg` in its listener parameters
/// * `arg` is treated as an opaque integer and is never dereferenced
#[no_mangle]
pub unsafe extern "C" fn conn_request_trampoline(conn_request: *mut c_void, arg: *mut c_void) {
    let request = NativeConnRequest::from_ptr(conn_request);
    let result = catch_unwind(AssertUnwindSafe(|| dispatch(request, arg)));

    // Handler panics are caught in dispatch; reaching here is a bridge bug
    if result.is_err() {
        error!(%request, "panic in connection trampoline");
    }
}

fn dispatch(request: NativeConnRequest, arg: *mut c_void) -> bool {
    match get_registry().resolve_ptr(arg) {
        Some(listener) => {
            listener.dispatch(request);
            true
        }
        None => {
            record_dropped_callback();
            debug!(
                %request,
                context = arg as usize,
                code = TetherError::HandleResolutionFailed.code(),
                "dropping connection request for unresolved listener"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runtime::dropped_callbacks;

    #[test]
    fn null_context_is_dropped() {
        let before = dropped_callbacks();
        unsafe { conn_request_trampoline(0x1usize as *mut c_void, std::ptr::null_mut()) };
        assert!(dropped_callbacks() > before);
    }

    #[test]
    fn forged_context_is_dropped() {
        assert!(!dispatch(
            NativeConnRequest::from_ptr(0x2usize as *mut c_void),
            usize::MAX as *mut c_void
        ));
    }
}
