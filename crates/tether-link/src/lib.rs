//! # Tether Link - Listener Callback Bridge
//!
//! Connects a native, callback-driven listener transport to typed Rust
//! connection handlers. The native side only ever sees a fixed C callback
//! and an opaque integer context; the integer is resolved back to the
//! owning listener through a process-wide handle registry.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │   ConnectionHandler      │
//! │   (user code)            │
//! └────────────▲─────────────┘
//!              │ ConnectionRequest
//! ┌────────────┴─────────────┐
//! │   Tether Link (Rust)     │
//! │   - Listener Lifecycle   │
//! │   - Handle Registry      │
//! │   - Address Conversion   │
//! └────────────▲─────────────┘
//!              │ cb(conn_request, handle)
//! ┌────────────┴─────────────┐
//! │   NativeTransport        │
//! └──────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Opaque Handles**: No Rust pointer ever crosses the boundary
//! - **Late-Callback Safety**: Callbacks for closed listeners are dropped, never dereferenced
//! - **Owned Addresses**: Raw sockaddr buffers released exactly once
//! - **Decide-Once Requests**: Undecided requests are rejected on drop
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tether_link::{ConnectionRequest, Listener, ListenerParams, LoopbackTransport};
//!
//! let transport = Arc::new(LoopbackTransport::new());
//! let mut params = ListenerParams::new();
//! params
//!     .set_socket_address("127.0.0.1:9000".parse::<std::net::SocketAddr>().unwrap())
//!     .unwrap()
//!     .set_connection_handler(|req: ConnectionRequest| {
//!         let _ = req.reject();
//!     });
//!
//! let mut listener = Listener::create(params, transport.clone()).unwrap();
//! transport
//!     .inject_connection(listener.native_id().unwrap(), "10.0.0.1:40000".parse().unwrap())
//!     .unwrap();
//! assert_eq!(listener.stats().rejected, 1);
//! listener.close().unwrap();
//! ```

pub mod adapter;
pub mod domain;
pub mod infrastructure;
pub mod listener;

// Re-export core types
pub use tether_core::{NativeConnRequest, NativeEndpointId, NativeListenerId, NativeTransport, TetherError};

pub use adapter::ffi::conn_request_trampoline;
pub use adapter::loopback::LoopbackTransport;
pub use domain::{
    ConnRequestAttributes, ListenerAttributes, ListenerError, ListenerResult, ListenerState,
    ListenerStats,
};
pub use infrastructure::ffi::{
    from_raw_address, outstanding_address_buffers, to_raw_address, ListenAddress, RawAddress,
};
pub use infrastructure::registry::{Handle, HandleRegistry};
pub use infrastructure::runtime::{dropped_callbacks, get_registry};
pub use listener::{
    ConnectionHandler, ConnectionRequest, Endpoint, Listener, ListenerParams, ListenerSettings,
    ListenerShared,
};

/// Library version
pub const TETHER_LINK_VERSION: &str = env!("CARGO_PKG_VERSION");
