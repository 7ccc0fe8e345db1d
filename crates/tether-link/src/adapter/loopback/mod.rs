//! Loopback Transport
//!
//! In-process [`NativeTransport`] that behaves like a callback-driven native
//! listener stack without touching the network. Connection requests are
//! injected by the embedder and delivered through the registered C callback
//! exactly as a native stack would deliver them, on the injecting thread.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tether_core::{
    FfiBuffer, FfiConnHandler, FfiListenerParams, ListenerParamField, NativeConnRequest,
    NativeCreateError, NativeEndpointId, NativeListenerId, NativeTransport, TetherError,
    TetherResult,
};
use tracing::{debug, trace};

use crate::infrastructure::ffi::{encode_socket_addr, from_raw_address, RawAddress};

/// First port handed out for port-0 binds
const EPHEMERAL_PORT_BASE: u16 = 49152;
const EPHEMERAL_PORT_SPAN: u32 = 16384;

#[derive(Debug)]
struct LoopbackListener {
    bound: SocketAddr,
    conn_handler: FfiConnHandler,
    address: Option<FfiBuffer>,
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    listener: NativeListenerId,
    peer: SocketAddr,
}

/// In-process transport
#[derive(Debug)]
pub struct LoopbackTransport {
    listeners: DashMap<u64, LoopbackListener>,
    pending: DashMap<usize, PendingRequest>,
    endpoints: DashMap<u64, SocketAddr>,
    next_id: AtomicU64,
    next_port: AtomicU32,
    fail_next_create: Mutex<Option<TetherError>>,
    fail_next_destroy: Mutex<Option<TetherError>>,
    fail_next_accept: Mutex<Option<TetherError>>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl LoopbackTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            pending: DashMap::new(),
            endpoints: DashMap::new(),
            next_id: AtomicU64::new(1),
            next_port: AtomicU32::new(0),
            fail_next_create: Mutex::new(None),
            fail_next_destroy: Mutex::new(None),
            fail_next_accept: Mutex::new(None),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Make the next `create_listener` call fail with `code`
    pub fn fail_next_create(&self, code: TetherError) {
        *self.fail_next_create.lock() = Some(code);
    }

    /// Make the next `destroy_listener` call fail with `code`, keeping the listener
    pub fn fail_next_destroy(&self, code: TetherError) {
        *self.fail_next_destroy.lock() = Some(code);
    }

    /// Make the next `accept` call fail with `code`, leaving the request pending
    pub fn fail_next_accept(&self, code: TetherError) {
        *self.fail_next_accept.lock() = Some(code);
    }

    /// Deliver a connection request from `peer` to a listener
    ///
    /// Invokes the listener's callback synchronously on the calling thread
    /// and returns the request handle that was passed to it.
    ///
    /// # Errors
    /// - `UnknownListener`: no such listener
    /// - `InvalidRequest`: the listener was created without a connection handler
    pub fn inject_connection(
        &self,
        listener: NativeListenerId,
        peer: SocketAddr,
    ) -> TetherResult<NativeConnRequest> {
        // Copy the descriptor out; the map guard must not be held across the callback
        let conn_handler = self
            .listeners
            .get(&listener.0)
            .map(|entry| entry.conn_handler)
            .ok_or(TetherError::UnknownListener)?;
        if conn_handler.cb.is_none() {
            return Err(TetherError::InvalidRequest);
        }

        let request = NativeConnRequest::from_ptr(self.allocate_id() as usize as *mut _);
        self.pending
            .insert(request.as_usize(), PendingRequest { listener, peer });
        trace!(%request, %peer, listener = listener.0, "injecting connection request");

        // SAFETY: the request handle was just issued by this transport
        unsafe { conn_handler.invoke(request.as_ptr()) };
        Ok(request)
    }

    /// Live listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Requests delivered but not yet accepted or rejected
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Open endpoints
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Total requests accepted
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Total requests rejected
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn bind(&self, mut addr: SocketAddr) -> SocketAddr {
        if addr.port() == 0 {
            let offset = self.next_port.fetch_add(1, Ordering::Relaxed) % EPHEMERAL_PORT_SPAN;
            addr.set_port(EPHEMERAL_PORT_BASE + offset as u16);
        }
        addr
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeTransport for LoopbackTransport {
    fn create_listener(
        &self,
        params: &FfiListenerParams,
        address: FfiBuffer,
    ) -> Result<NativeListenerId, NativeCreateError> {
        if !params.is_valid() {
            return Err(NativeCreateError::new(TetherError::InvalidRequest, address));
        }
        if let Some(code) = self.fail_next_create.lock().take() {
            return Err(NativeCreateError::new(code, address));
        }

        // SAFETY: is_valid guarantees a non-null pointer to addrlen bytes
        let raw = unsafe {
            std::slice::from_raw_parts(params.sockaddr.addr, params.sockaddr.addrlen as usize)
        };
        let requested = match from_raw_address(raw) {
            Ok(addr) => addr,
            Err(e) => return Err(NativeCreateError::new(e.code(), address)),
        };

        let conn_handler = if params.has_field(ListenerParamField::CONN_HANDLER) {
            params.conn_handler
        } else {
            FfiConnHandler::new()
        };

        let id = self.allocate_id();
        let bound = self.bind(requested);
        self.listeners.insert(
            id,
            LoopbackListener {
                bound,
                conn_handler,
                address: Some(address),
            },
        );
        debug!(listener = id, %bound, "loopback listener created");
        Ok(NativeListenerId(id))
    }

    fn destroy_listener(&self, listener: NativeListenerId) -> TetherResult<Option<FfiBuffer>> {
        if let Some(code) = self.fail_next_destroy.lock().take() {
            return Err(code);
        }
        let (_, entry) = self
            .listeners
            .remove(&listener.0)
            .ok_or(TetherError::UnknownListener)?;
        self.pending.retain(|_, pending| pending.listener != listener);
        debug!(listener = listener.0, "loopback listener destroyed");
        Ok(entry.address)
    }

    fn query_listener(&self, listener: NativeListenerId) -> TetherResult<Vec<u8>> {
        self.listeners
            .get(&listener.0)
            .map(|entry| encode_socket_addr(&entry.bound))
            .ok_or(TetherError::UnknownListener)
    }

    fn query_conn_request(&self, request: NativeConnRequest) -> TetherResult<Vec<u8>> {
        self.pending
            .get(&request.as_usize())
            .map(|pending| encode_socket_addr(&pending.peer))
            .ok_or(TetherError::UnknownConnRequest)
    }

    fn accept(&self, request: NativeConnRequest) -> TetherResult<NativeEndpointId> {
        if let Some(code) = self.fail_next_accept.lock().take() {
            return Err(code);
        }
        let (_, pending) = self
            .pending
            .remove(&request.as_usize())
            .ok_or(TetherError::UnknownConnRequest)?;
        let id = self.allocate_id();
        self.endpoints.insert(id, pending.peer);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(NativeEndpointId(id))
    }

    fn reject(&self, request: NativeConnRequest) -> TetherResult<()> {
        self.pending
            .remove(&request.as_usize())
            .ok_or(TetherError::UnknownConnRequest)?;
        self.rejected.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close_endpoint(&self, endpoint: NativeEndpointId) -> TetherResult<()> {
        self.endpoints
            .remove(&endpoint.0)
            .map(|_| ())
            .ok_or(TetherError::InvalidRequest)
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        // Listeners leaked by their owners still hold address buffers
        for mut entry in self.listeners.iter_mut() {
            if let Some(address) = entry.address.take() {
                drop(RawAddress::from_ffi(address));
            }
        }
    }
}
