//! Listener Parameters
//!
//! Mutable configuration gathered before a listener is created: the socket
//! address (held as an owned raw sockaddr buffer) and an optional connection
//! handler. Settings can also be loaded declaratively from JSON.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use serde::Deserialize;
use tether_core::ListenerParamField;
use tracing::debug;

use super::handler::ConnectionHandler;
use crate::domain::{ListenerError, ListenerResult};
use crate::infrastructure::ffi::{to_raw_address, ListenAddress, RawAddress};

/// Declarative listener settings
///
/// ```json
/// { "host": "127.0.0.1", "port": 9000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerSettings {
    /// Literal IPv4 or IPv6 address (no name resolution)
    pub host: String,
    /// Port to listen on, `0` for an ephemeral port
    #[serde(default)]
    pub port: u16,
}

impl ListenerSettings {
    /// Parse settings from JSON text
    pub fn from_json(text: &str) -> ListenerResult<Self> {
        serde_json::from_str(text).map_err(|e| ListenerError::InvalidSettings(e.to_string()))
    }

    /// Resolve to a socket address
    ///
    /// # Errors
    /// - `InvalidAddress`: `host` is not an IP literal
    pub fn socket_addr(&self) -> ListenerResult<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ListenerError::InvalidAddress(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Configuration for [`super::Listener::create`]
#[derive(Default)]
pub struct ListenerParams {
    address: Option<RawAddress>,
    conn_handler: Option<Arc<dyn ConnectionHandler>>,
}

impl ListenerParams {
    /// Empty parameters: no address, no handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Build parameters from declarative settings
    pub fn from_settings(settings: &ListenerSettings) -> ListenerResult<Self> {
        let mut params = Self::new();
        params.set_socket_address(settings.socket_addr()?)?;
        Ok(params)
    }

    /// Set the address to listen on
    ///
    /// Any previously set address buffer is released first, so setting the
    /// address repeatedly never leaks. On error the parameters are unchanged.
    ///
    /// # Errors
    /// - `UnsupportedFamily`: the address is not IPv4/IPv6
    pub fn set_socket_address(
        &mut self,
        addr: impl Into<ListenAddress>,
    ) -> ListenerResult<&mut Self> {
        let addr = addr.into();
        let raw = to_raw_address(&addr)?;
        if let Some(mut previous) = self.address.replace(raw) {
            previous.release();
        }
        debug!(%addr, "listener address set");
        Ok(self)
    }

    /// Set the handler invoked for each connection request
    pub fn set_connection_handler<H>(&mut self, handler: H) -> &mut Self
    where
        H: ConnectionHandler + 'static,
    {
        self.conn_handler = Some(Arc::new(handler));
        self
    }

    /// Whether an address has been set
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Whether a connection handler has been set
    pub fn has_connection_handler(&self) -> bool {
        self.conn_handler.is_some()
    }

    /// Currently configured address, decoded from its raw form
    pub fn socket_address(&self) -> Option<SocketAddr> {
        self.address.as_ref()?.to_socket_addr().ok()
    }

    /// Bitmask of the populated fields, as reported to the transport
    pub fn field_mask(&self) -> u64 {
        let mut mask = 0;
        if self.address.is_some() {
            mask |= ListenerParamField::SOCK_ADDR;
        }
        if self.conn_handler.is_some() {
            mask |= ListenerParamField::CONN_HANDLER;
        }
        mask
    }

    pub(crate) fn into_parts(self) -> (Option<RawAddress>, Option<Arc<dyn ConnectionHandler>>) {
        (self.address, self.conn_handler)
    }
}

impl fmt::Debug for ListenerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerParams")
            .field("address", &self.address)
            .field("conn_handler", &self.conn_handler.is_some())
            .finish()
    }
}
