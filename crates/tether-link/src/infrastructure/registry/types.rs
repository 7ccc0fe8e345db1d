//! # Handle Registry
//!
//! Maps opaque handles to reference-counted objects. A handle is a plain
//! integer, so a forged or stale value coming back from native code can only
//! miss the map; it is never dereferenced.

use dashmap::DashMap;
use std::ffi::c_void;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

// ============================================================================
// HANDLE
// ============================================================================

/// Opaque token standing in for a registered object
///
/// Pointer-sized so it fits the single `void *` context slot of a native
/// callback. Zero is never issued, which keeps a null context distinguishable.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    /// Handle value as the opaque callback context
    pub fn into_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    /// Recover a handle from an opaque callback context
    ///
    /// Returns `None` for null. Any other value is accepted as a candidate;
    /// whether it names a live entry is decided by [`HandleRegistry::resolve`].
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        match ptr as usize {
            0 => None,
            raw => Some(Self(raw)),
        }
    }

    /// Raw handle value
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

// ============================================================================
// HANDLE ALLOCATION
// ============================================================================

/// Handle allocator for generating unique identifiers
///
/// Monotonic: a value is handed out at most once, so a revoked handle can
/// never be resurrected by a later registration.
#[derive(Debug)]
pub struct HandleAllocator {
    /// Next handle to allocate
    next_handle: AtomicUsize,
}

impl HandleAllocator {
    /// Create new allocator starting at handle 1
    pub fn new() -> Self {
        Self {
            next_handle: AtomicUsize::new(1),
        }
    }

    /// Allocate next unique handle
    pub fn allocate(&self) -> Handle {
        Handle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HANDLE REGISTRY
// ============================================================================

/// Thread-safe handle-to-object table
///
/// `register`, `resolve` and `revoke` are all O(1) and safe to call from any
/// thread, including native callback threads.
pub struct HandleRegistry<T: ?Sized> {
    /// Map of handle -> object
    entries: DashMap<usize, Arc<T>>,

    /// Handle allocator
    allocator: HandleAllocator,
}

impl<T: ?Sized> HandleRegistry<T> {
    /// Create new empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            allocator: HandleAllocator::new(),
        }
    }

    /// Store an object under a freshly allocated handle
    pub fn register(&self, obj: Arc<T>) -> Handle {
        let handle = self.allocator.allocate();
        self.entries.insert(handle.0, obj);
        debug!(%handle, live = self.entries.len(), "registered callback object");
        handle
    }

    /// Lookup object by handle
    ///
    /// Returns `None` for unknown or revoked handles.
    pub fn resolve(&self, handle: Handle) -> Option<Arc<T>> {
        let found = self.entries.get(&handle.0).map(|entry| Arc::clone(entry.value()));
        if found.is_none() {
            trace!(%handle, "handle did not resolve");
        }
        found
    }

    /// Lookup object by the raw callback context
    ///
    /// This is the entry point for values coming back from native code; null
    /// and forged values simply yield `None`.
    pub fn resolve_ptr(&self, ptr: *mut c_void) -> Option<Arc<T>> {
        Handle::from_ptr(ptr).and_then(|handle| self.resolve(handle))
    }

    /// Remove a mapping
    ///
    /// The handle is invalid afterwards. References already handed out by
    /// `resolve` stay valid; the registry's own reference is returned (or
    /// dropped by the caller) so the object can be reclaimed.
    pub fn revoke(&self, handle: Handle) -> Option<Arc<T>> {
        let removed = self.entries.remove(&handle.0).map(|(_, obj)| obj);
        if removed.is_some() {
            debug!(%handle, live = self.entries.len(), "revoked callback handle");
        }
        removed
    }

    /// Check if a handle is live
    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    /// Get count of live entries
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get list of all live handles
    pub fn list_handles(&self) -> Vec<Handle> {
        self.entries.iter().map(|entry| Handle(*entry.key())).collect()
    }
}

impl<T: ?Sized> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for HandleRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live", &self.entries.len())
            .finish()
    }
}
