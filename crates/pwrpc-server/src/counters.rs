//! Request Lifecycle Counters
//!
//! Four process-wide counters: active clients, lifetime admitted requests,
//! lifetime succeeded RPCs, lifetime failed RPCs. The counters are
//! independent, so each is its own atomic.
//!
//! Admission is a compare-and-swap on the active count: the count can
//! never exceed the cap, however many connections race. Every successful
//! admission is paired with exactly one release through [`ClientGuard`].

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Counters {
    active_clients: AtomicU32,
    new_connections: AtomicU64,
    request_success: AtomicU64,
    request_failed: AtomicU64,
}

/// Plain-value copy of the counters, taken for self-metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub active_clients: u32,
    pub new_connections: u64,
    pub request_success: u64,
    pub request_failed: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to admit a client under the cap. On success the active count
    /// is incremented and must be released exactly once.
    pub fn try_admit(&self, max_clients: u32) -> bool {
        self.active_clients
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n >= max_clients {
                    None
                } else {
                    Some(n + 1)
                }
            })
            .is_ok()
    }

    fn release_client(&self) {
        let prev = self.active_clients.fetch_sub(1, Ordering::SeqCst);
        assert!(prev > 0, "active client count underflow");
    }

    pub fn record_new_connection(&self) {
        self.new_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, n: u64) {
        self.request_success.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_failure(&self, n: u64) {
        self.request_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            active_clients: self.active_clients.load(Ordering::SeqCst),
            new_connections: self.new_connections.load(Ordering::Relaxed),
            request_success: self.request_success.load(Ordering::Relaxed),
            request_failed: self.request_failed.load(Ordering::Relaxed),
        }
    }
}

/// Releases one admitted client on drop.
pub struct ClientGuard {
    counters: Arc<Counters>,
}

impl ClientGuard {
    /// Admit a client, returning the guard that releases it, or `None`
    /// when the cap is exhausted.
    pub fn admit(counters: &Arc<Counters>, max_clients: u32) -> Option<Self> {
        if counters.try_admit(max_clients) {
            Some(Self {
                counters: Arc::clone(counters),
            })
        } else {
            None
        }
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.counters.release_client();
    }
}
