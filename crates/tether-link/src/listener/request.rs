//! Connection Requests and Endpoints
//!
//! A [`ConnectionRequest`] wraps the native handle delivered to the
//! connection callback together with the listener it arrived on. It is
//! decided exactly once: `accept` yields an [`Endpoint`], `reject` releases
//! it, and dropping it undecided rejects it.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tether_core::{NativeConnRequest, NativeEndpointId, NativeTransport};
use tracing::{debug, warn};

use super::ListenerShared;
use crate::domain::types::ListenerCounters;
use crate::domain::{ConnRequestAttributes, ListenerError, ListenerResult};
use crate::infrastructure::ffi::from_raw_address;

/// Pending connection request on a listener
pub struct ConnectionRequest {
    native: NativeConnRequest,
    listener: Arc<ListenerShared>,
    consumed: AtomicBool,
}

impl ConnectionRequest {
    pub(crate) fn new(native: NativeConnRequest, listener: Arc<ListenerShared>) -> Self {
        Self {
            native,
            listener,
            consumed: AtomicBool::new(false),
        }
    }

    /// Native handle of this request
    pub fn native(&self) -> NativeConnRequest {
        self.native
    }

    /// Whether `accept` or `reject` has already been called
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }

    /// Query the peer behind this request
    ///
    /// # Errors
    /// - `AlreadyConsumed`: the request was already decided
    pub fn query(&self) -> ListenerResult<ConnRequestAttributes> {
        if self.is_consumed() {
            return Err(ListenerError::AlreadyConsumed(self.native));
        }
        let bytes = self.listener.transport.query_conn_request(self.native)?;
        Ok(ConnRequestAttributes {
            client_address: from_raw_address(&bytes)?,
        })
    }

    /// Accept the request, producing a new endpoint
    ///
    /// If the transport refuses, the request stays pending: it can still be
    /// rejected, and is rejected on drop otherwise.
    ///
    /// # Errors
    /// - `AlreadyConsumed`: the request was already decided
    /// - `Native`: the transport refused
    pub fn accept(&self) -> ListenerResult<Endpoint> {
        self.consume()?;
        let peer = self
            .listener
            .transport
            .query_conn_request(self.native)
            .ok()
            .and_then(|bytes| from_raw_address(&bytes).ok());
        let id = match self.listener.transport.accept(self.native) {
            Ok(id) => id,
            Err(code) => {
                self.unconsume();
                debug!(request = %self.native, error = %code, "native accept failed");
                return Err(code.into());
            }
        };
        ListenerCounters::bump(&self.listener.counters.accepted);
        debug!(request = %self.native, endpoint = id.0, "connection request accepted");
        Ok(Endpoint::new(id, peer, Arc::clone(&self.listener.transport)))
    }

    /// Reject the request
    ///
    /// A refused native reject leaves the request pending, like [`Self::accept`].
    ///
    /// # Errors
    /// - `AlreadyConsumed`: the request was already decided
    /// - `Native`: the transport refused
    pub fn reject(&self) -> ListenerResult<()> {
        self.consume()?;
        if let Err(code) = self.listener.transport.reject(self.native) {
            self.unconsume();
            return Err(code.into());
        }
        ListenerCounters::bump(&self.listener.counters.rejected);
        debug!(request = %self.native, "connection request rejected");
        Ok(())
    }

    fn consume(&self) -> ListenerResult<()> {
        if self.consumed.swap(true, Ordering::AcqRel) {
            return Err(ListenerError::AlreadyConsumed(self.native));
        }
        Ok(())
    }

    fn unconsume(&self) {
        self.consumed.store(false, Ordering::Release);
    }
}

impl Drop for ConnectionRequest {
    fn drop(&mut self) {
        if self.consumed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.listener.transport.reject(self.native) {
            Ok(()) => {
                ListenerCounters::bump(&self.listener.counters.auto_rejected);
                warn!(request = %self.native, "connection request dropped undecided, rejected");
            }
            Err(code) => {
                warn!(request = %self.native, error = %code, "failed to reject dropped connection request");
            }
        }
    }
}

impl fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("native", &self.native)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// Accepted connection endpoint
///
/// Closed on drop if not closed explicitly.
pub struct Endpoint {
    id: NativeEndpointId,
    peer: Option<SocketAddr>,
    transport: Arc<dyn NativeTransport>,
    closed: bool,
}

impl Endpoint {
    fn new(id: NativeEndpointId, peer: Option<SocketAddr>, transport: Arc<dyn NativeTransport>) -> Self {
        Self {
            id,
            peer,
            transport,
            closed: false,
        }
    }

    /// Native endpoint handle
    pub fn id(&self) -> NativeEndpointId {
        self.id
    }

    /// Peer address as reported when the request was accepted
    pub fn peer_address(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Whether [`Endpoint::close`] has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the endpoint; repeated calls are no-ops
    pub fn close(&mut self) -> ListenerResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close_endpoint(self.id)?;
        debug!(endpoint = self.id.0, "endpoint closed");
        Ok(())
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(endpoint = self.id.0, error = %e, "failed to close endpoint");
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.closed)
            .finish()
    }
}
