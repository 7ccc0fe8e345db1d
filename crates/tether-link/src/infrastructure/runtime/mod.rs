//! Global Runtime State
//!
//! The native callback carries nothing but an opaque integer, so the table
//! that turns it back into a listener has to be reachable without context.
//! This module owns that process-wide registry and the counter for callbacks
//! that could not be resolved.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use crate::infrastructure::registry::HandleRegistry;
use crate::listener::ListenerShared;

/// Global listener registry (thread-safe)
/// Maps callback handles to the state of live listeners
static LISTENER_REGISTRY: LazyLock<HandleRegistry<ListenerShared>> =
    LazyLock::new(HandleRegistry::new);

/// Trampoline invocations whose context did not resolve
static DROPPED_CALLBACKS: AtomicU64 = AtomicU64::new(0);

/// Get reference to global listener registry
pub fn get_registry() -> &'static HandleRegistry<ListenerShared> {
    &LISTENER_REGISTRY
}

/// Number of connection callbacks dropped because their handle was unknown
///
/// Covers both callbacks racing a listener teardown and forged or corrupted
/// contexts; the two cannot be told apart from the handle alone.
pub fn dropped_callbacks() -> u64 {
    DROPPED_CALLBACKS.load(Ordering::Relaxed)
}

pub(crate) fn record_dropped_callback() {
    DROPPED_CALLBACKS.fetch_add(1, Ordering::Relaxed);
}
