//! Listener Lifecycle
//!
//! A [`Listener`] owns one native listener resource. When it carries a
//! connection handler, the handler's shared state is packed into the global
//! registry and only the resulting integer handle crosses into the native
//! transport as callback context.
//!
//! ## Ordering
//!
//! - Creation registers the handle before the native call and revokes it if
//!   the native call fails.
//! - Close revokes the handle before destroying the native resource, so a
//!   callback racing the teardown resolves to nothing and is dropped.

mod handler;
mod params;
mod request;

pub use handler::ConnectionHandler;
pub use params::{ListenerParams, ListenerSettings};
pub use request::{ConnectionRequest, Endpoint};

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tether_core::{
    FfiConnHandler, FfiListenerParams, ListenerParamField, NativeConnRequest, NativeCreateError,
    NativeListenerId, NativeTransport,
};
use tracing::{debug, trace, warn};

use crate::adapter::ffi::conn_request_trampoline;
use crate::domain::types::ListenerCounters;
use crate::domain::{ListenerAttributes, ListenerError, ListenerResult, ListenerState, ListenerStats};
use crate::infrastructure::ffi::{from_raw_address, RawAddress};
use crate::infrastructure::registry::Handle;
use crate::infrastructure::runtime::get_registry;

/// State reachable from the connection callback
///
/// Lives in the registry while the listener is open and inside every
/// outstanding [`ConnectionRequest`].
pub struct ListenerShared {
    handler: Option<Arc<dyn ConnectionHandler>>,
    transport: Arc<dyn NativeTransport>,
    counters: ListenerCounters,
}

impl ListenerShared {
    /// Deliver one native connection request to the handler
    ///
    /// A panicking handler is contained here; the request it held is
    /// rejected while unwinding.
    pub(crate) fn dispatch(self: Arc<Self>, native: NativeConnRequest) {
        ListenerCounters::bump(&self.counters.requests);
        trace!(request = %native, "dispatching connection request");

        let request = ConnectionRequest::new(native, Arc::clone(&self));
        let Some(handler) = self.handler.as_ref() else {
            // No handler to decide it; dropping rejects.
            drop(request);
            return;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| handler.on_connection_request(request)));
        if outcome.is_err() {
            ListenerCounters::bump(&self.counters.handler_panics);
            warn!(request = %native, "connection handler panicked");
        }
    }
}

impl fmt::Debug for ListenerShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerShared")
            .field("handler", &self.handler.is_some())
            .field("transport", &self.transport)
            .finish()
    }
}

/// Native listener bound to a socket address
pub struct Listener {
    native: Option<NativeListenerId>,
    handle: Option<Handle>,
    shared: Arc<ListenerShared>,
    state: ListenerState,
}

impl Listener {
    /// Create a listener on `transport`
    ///
    /// On any failure the registry and address buffers are left as they were
    /// before the call.
    ///
    /// # Errors
    /// - `MissingAddress`: no address was set
    /// - `NativeCreateFailed`: the transport refused to create the resource
    pub fn create(
        params: ListenerParams,
        transport: Arc<dyn NativeTransport>,
    ) -> ListenerResult<Self> {
        let (address, handler) = params.into_parts();
        let address = address.ok_or(ListenerError::MissingAddress)?;

        let shared = Arc::new(ListenerShared {
            handler,
            transport,
            counters: ListenerCounters::default(),
        });

        let mut ffi_params = FfiListenerParams::new();
        ffi_params.field_mask = ListenerParamField::SOCK_ADDR;
        ffi_params.sockaddr = address.sockaddr();

        let handle = shared.handler.as_ref().map(|_| {
            let handle = get_registry().register(Arc::clone(&shared));
            ffi_params.field_mask |= ListenerParamField::CONN_HANDLER;
            ffi_params.conn_handler = FfiConnHandler {
                cb: Some(conn_request_trampoline),
                arg: handle.into_ptr(),
            };
            handle
        });

        let created = shared.transport.create_listener(&ffi_params, address.into_ffi());
        match created {
            Ok(native) => {
                debug!(native = native.0, ?handle, "listener created");
                Ok(Self {
                    native: Some(native),
                    handle,
                    shared,
                    state: ListenerState::Listening,
                })
            }
            Err(NativeCreateError { code, address }) => {
                if let Some(handle) = handle {
                    get_registry().revoke(handle);
                }
                drop(RawAddress::from_ffi(address));
                warn!(error = %code, "native listener creation failed");
                Err(ListenerError::NativeCreateFailed(code))
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Registry handle given to the transport, if a handler is installed
    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    /// Native listener handle while open
    pub fn native_id(&self) -> Option<NativeListenerId> {
        self.native
    }

    /// Snapshot of the connection counters
    pub fn stats(&self) -> ListenerStats {
        self.shared.counters.snapshot()
    }

    /// Query the address the listener is bound to
    ///
    /// # Errors
    /// - `ListenerClosed`: the listener was closed
    pub fn query(&self) -> ListenerResult<ListenerAttributes> {
        let native = self.native.ok_or(ListenerError::ListenerClosed)?;
        let bytes = self.shared.transport.query_listener(native)?;
        Ok(ListenerAttributes {
            sockaddr: from_raw_address(&bytes)?,
        })
    }

    /// Close the listener
    ///
    /// Revokes the callback handle, then destroys the native resource and
    /// releases the address buffer it returns. Idempotent once it succeeds.
    ///
    /// If the transport fails to destroy the resource the listener stays
    /// `Listening` with its native handle kept, so a later `close` (or drop)
    /// retries. The callback handle stays revoked either way.
    pub fn close(&mut self) -> ListenerResult<()> {
        if self.state == ListenerState::Closed {
            return Ok(());
        }
        if let Some(handle) = self.handle.take() {
            get_registry().revoke(handle);
        }

        if let Some(native) = self.native {
            match self.shared.transport.destroy_listener(native) {
                Ok(Some(address)) => drop(RawAddress::from_ffi(address)),
                Ok(None) => trace!(native = native.0, "transport kept no address buffer"),
                Err(code) => {
                    warn!(native = native.0, error = %code, "native listener destroy failed");
                    return Err(code.into());
                }
            }
            debug!(native = native.0, "listener closed");
        }
        self.native = None;
        self.state = ListenerState::Closed;
        Ok(())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "listener teardown failed");
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("native", &self.native)
            .field("handle", &self.handle)
            .field("state", &self.state)
            .finish()
    }
}
