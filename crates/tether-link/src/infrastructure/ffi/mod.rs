//! FFI Address Conversion
//!
//! Converts structured listen addresses into the raw `sockaddr_in` /
//! `sockaddr_in6` images the native transport reads, and back again.
//!
//! A converted address lives in a [`RawAddress`], which owns the native
//! allocation and releases it exactly once: on [`RawAddress::release`], on
//! drop, or never if ownership was transferred to the transport.

use std::fmt;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use tether_core::{FfiBuffer, FfiSockAddr};
use tracing::trace;

use crate::domain::error::{ListenerError, ListenerResult};

/// Address buffers allocated and not yet released, across all owners
static OUTSTANDING_BUFFERS: AtomicUsize = AtomicUsize::new(0);

/// Number of raw address buffers currently alive
///
/// Counts buffers whether they are held by a configuration or by the native
/// transport. Returns to its previous value once every buffer is released.
pub fn outstanding_address_buffers() -> usize {
    OUTSTANDING_BUFFERS.load(Ordering::Acquire)
}

// ============================================================================
// LISTEN ADDRESS
// ============================================================================

/// Structured address a listener may be asked to bind
///
/// Only the IP variants can be converted; the native listener has no
/// representation for Unix-domain paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    /// IPv4 or IPv6 host and port
    Inet(SocketAddr),
    /// Unix-domain socket path
    Unix(PathBuf),
}

impl ListenAddress {
    /// Short family label for diagnostics
    pub fn family_name(&self) -> &'static str {
        match self {
            ListenAddress::Inet(SocketAddr::V4(_)) => "inet",
            ListenAddress::Inet(SocketAddr::V6(_)) => "inet6",
            ListenAddress::Unix(_) => "unix",
        }
    }
}

impl From<SocketAddr> for ListenAddress {
    fn from(addr: SocketAddr) -> Self {
        ListenAddress::Inet(addr)
    }
}

impl From<SocketAddrV4> for ListenAddress {
    fn from(addr: SocketAddrV4) -> Self {
        ListenAddress::Inet(SocketAddr::V4(addr))
    }
}

impl From<SocketAddrV6> for ListenAddress {
    fn from(addr: SocketAddrV6) -> Self {
        ListenAddress::Inet(SocketAddr::V6(addr))
    }
}

impl From<(IpAddr, u16)> for ListenAddress {
    fn from((ip, port): (IpAddr, u16)) -> Self {
        ListenAddress::Inet(SocketAddr::new(ip, port))
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Inet(addr) => write!(f, "{}", addr),
            ListenAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

// ============================================================================
// RAW ADDRESS
// ============================================================================

/// Owned raw socket address buffer
pub struct RawAddress {
    /// `None` once released or transferred
    buffer: Option<FfiBuffer>,
}

impl RawAddress {
    fn from_bytes(bytes: Vec<u8>) -> Self {
        OUTSTANDING_BUFFERS.fetch_add(1, Ordering::AcqRel);
        Self {
            buffer: Some(FfiBuffer::from_vec(bytes)),
        }
    }

    /// Reclaim a buffer previously given away with [`RawAddress::into_ffi`]
    pub(crate) fn from_ffi(buffer: FfiBuffer) -> Self {
        Self {
            buffer: Some(buffer),
        }
    }

    /// Give up ownership of the allocation (e.g. to the native transport)
    ///
    /// The buffer stays counted as outstanding until it comes back through
    /// [`RawAddress::from_ffi`] and is released.
    pub(crate) fn into_ffi(mut self) -> FfiBuffer {
        self.buffer.take().unwrap_or_default()
    }

    /// Whether this value still owns an allocation
    pub fn is_owned(&self) -> bool {
        self.buffer.is_some()
    }

    /// Raw sockaddr bytes (empty once released)
    pub fn as_bytes(&self) -> &[u8] {
        match &self.buffer {
            // SAFETY: the buffer was built by FfiBuffer::from_vec and is owned here
            Some(buffer) => unsafe { buffer.as_slice() },
            None => &[],
        }
    }

    /// Length of the sockaddr image in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if no bytes are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reference suitable for [`tether_core::FfiListenerParams::sockaddr`]
    pub fn sockaddr(&self) -> FfiSockAddr {
        let bytes = self.as_bytes();
        if bytes.is_empty() {
            return FfiSockAddr::new();
        }
        FfiSockAddr {
            addr: bytes.as_ptr(),
            addrlen: bytes.len() as u32,
            _padding: 0,
        }
    }

    /// Decode back into a socket address
    pub fn to_socket_addr(&self) -> ListenerResult<SocketAddr> {
        from_raw_address(self.as_bytes())
    }

    /// Release the allocation
    ///
    /// Idempotent: returns `true` only for the call that actually freed it.
    pub fn release(&mut self) -> bool {
        match self.buffer.take() {
            Some(buffer) => {
                // SAFETY: every owned buffer originates from FfiBuffer::from_vec
                drop(unsafe { buffer.into_vec() });
                OUTSTANDING_BUFFERS.fetch_sub(1, Ordering::AcqRel);
                trace!("released raw address buffer");
                true
            }
            None => false,
        }
    }
}

impl Drop for RawAddress {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for RawAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAddress")
            .field("len", &self.len())
            .field("addr", &self.to_socket_addr().ok())
            .finish()
    }
}

// ============================================================================
// CONVERSION
// ============================================================================

/// Convert a structured address into an owned raw sockaddr buffer
///
/// The buffer is sized for the concrete family (`sockaddr_in` or
/// `sockaddr_in6`).
///
/// # Errors
/// - `UnsupportedFamily`: the address is not IPv4/IPv6
pub fn to_raw_address(addr: &ListenAddress) -> ListenerResult<RawAddress> {
    let bytes = match addr {
        ListenAddress::Inet(SocketAddr::V4(v4)) => encode_v4(v4),
        ListenAddress::Inet(SocketAddr::V6(v6)) => encode_v6(v6),
        ListenAddress::Unix(_) => {
            return Err(ListenerError::UnsupportedFamily(addr.to_string()));
        }
    };
    Ok(RawAddress::from_bytes(bytes))
}

/// Decode raw sockaddr bytes produced by [`to_raw_address`] or by the transport
///
/// # Errors
/// - `InvalidAddress`: too short for the family it claims
/// - `UnsupportedFamily`: a family other than `AF_INET`/`AF_INET6`
pub fn from_raw_address(bytes: &[u8]) -> ListenerResult<SocketAddr> {
    if bytes.len() < mem::size_of::<libc::sa_family_t>()
        || bytes.len() > mem::size_of::<libc::sockaddr_storage>()
    {
        return Err(ListenerError::InvalidAddress(format!(
            "sockaddr of {} bytes",
            bytes.len()
        )));
    }

    // SAFETY: sockaddr_storage is plain old data; an all-zero value is valid
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    // SAFETY: bytes.len() <= size_of::<sockaddr_storage>() was checked above
    unsafe {
        ptr::copy_nonoverlapping(
            bytes.as_ptr(),
            &mut storage as *mut _ as *mut u8,
            bytes.len(),
        );
    }

    match storage.ss_family as libc::c_int {
        libc::AF_INET => {
            if bytes.len() < mem::size_of::<libc::sockaddr_in>() {
                return Err(ListenerError::InvalidAddress(format!(
                    "sockaddr_in of {} bytes",
                    bytes.len()
                )));
            }
            // SAFETY: storage is large enough and aligned for sockaddr_in
            let sin = unsafe { &*(&storage as *const _ as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes());
            let port = u16::from_be(sin.sin_port);
            Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }
        libc::AF_INET6 => {
            if bytes.len() < mem::size_of::<libc::sockaddr_in6>() {
                return Err(ListenerError::InvalidAddress(format!(
                    "sockaddr_in6 of {} bytes",
                    bytes.len()
                )));
            }
            // SAFETY: storage is large enough and aligned for sockaddr_in6
            let sin6 = unsafe { &*(&storage as *const _ as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            let port = u16::from_be(sin6.sin6_port);
            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                port,
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        family => Err(ListenerError::UnsupportedFamily(format!("family {}", family))),
    }
}

/// Encode a socket address without taking part in buffer accounting
///
/// Used by transports that report addresses back as plain byte vectors.
pub fn encode_socket_addr(addr: &SocketAddr) -> Vec<u8> {
    match addr {
        SocketAddr::V4(v4) => encode_v4(v4),
        SocketAddr::V6(v6) => encode_v6(v6),
    }
}

fn encode_v4(addr: &SocketAddrV4) -> Vec<u8> {
    // SAFETY: sockaddr_in is plain old data; an all-zero value is valid
    let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_port = addr.port().to_be();
    sin.sin_addr.s_addr = u32::from_ne_bytes(addr.ip().octets());
    struct_bytes(&sin)
}

fn encode_v6(addr: &SocketAddrV6) -> Vec<u8> {
    // SAFETY: sockaddr_in6 is plain old data; an all-zero value is valid
    let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };
    sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    sin6.sin6_port = addr.port().to_be();
    sin6.sin6_flowinfo = addr.flowinfo();
    sin6.sin6_addr.s6_addr = addr.ip().octets();
    sin6.sin6_scope_id = addr.scope_id();
    struct_bytes(&sin6)
}

fn struct_bytes<T>(value: &T) -> Vec<u8> {
    // SAFETY: T is a fully initialized (zeroed, then assigned) C struct
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, mem::size_of::<T>()) }
        .to_vec()
}
