//! Domain Types Module
//!
//! Lifecycle state, statistics, and query results for listeners and
//! connection requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Listener lifecycle
///
/// The pre-creation phase is a [`crate::ListenerParams`]; a `Listener` value
/// only exists once its native resource does. It never leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerState {
    /// Native resource live, callbacks may arrive
    Listening,
    /// Native resource destroyed, handle revoked
    Closed,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerState::Listening => "listening",
            ListenerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Result of querying a live listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerAttributes {
    /// Address the native listener is bound to
    pub sockaddr: SocketAddr,
}

/// Result of querying a pending connection request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnRequestAttributes {
    /// Address of the connecting peer
    pub client_address: SocketAddr,
}

/// Per-listener counters, updated from native callback threads
#[derive(Debug, Default)]
pub(crate) struct ListenerCounters {
    pub requests: AtomicU64,
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    pub auto_rejected: AtomicU64,
    pub handler_panics: AtomicU64,
}

impl ListenerCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            requests: self.requests.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            auto_rejected: self.auto_rejected.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

/// Listener statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStats {
    /// Connection requests dispatched to the handler
    pub requests: u64,
    /// Requests accepted by the handler
    pub accepted: u64,
    /// Requests rejected by the handler
    pub rejected: u64,
    /// Requests dropped undecided and rejected on the handler's behalf
    pub auto_rejected: u64,
    /// Handler invocations that panicked
    pub handler_panics: u64,
}

impl ListenerStats {
    /// Requests that reached a final decision
    pub fn decided(&self) -> u64 {
        self.accepted + self.rejected + self.auto_rejected
    }

    /// Serialize statistics to JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize statistics from JSON bytes
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_snapshot() {
        let counters = ListenerCounters::default();
        ListenerCounters::bump(&counters.requests);
        ListenerCounters::bump(&counters.requests);
        ListenerCounters::bump(&counters.rejected);
        ListenerCounters::bump(&counters.auto_rejected);

        let stats = counters.snapshot();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.decided(), 2);
    }

    #[test]
    fn stats_serialization() {
        let stats = ListenerStats {
            requests: 10,
            accepted: 7,
            rejected: 2,
            auto_rejected: 1,
            handler_panics: 0,
        };

        let json_bytes = stats.to_json_bytes().expect("serialization failed");
        let text = String::from_utf8(json_bytes.clone()).unwrap();
        assert!(text.contains("\"accepted\":7"));

        let deserialized = ListenerStats::from_json_bytes(&json_bytes)
            .expect("deserialization failed");
        assert_eq!(deserialized, stats);
    }

    #[test]
    fn state_json_names() {
        let json = serde_json::to_string(&ListenerState::Listening).unwrap();
        assert_eq!(json, "\"Listening\"");
        assert!(serde_json::from_str::<ListenerState>("\"Created\"").is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(ListenerState::Listening.to_string(), "listening");
        assert_eq!(ListenerState::Closed.to_string(), "closed");
    }
}
