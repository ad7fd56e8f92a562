//! Mutex-guarded accounting of live connections.
//!
//! The registry is the only state shared across worker threads. It is owned
//! by the server and injected into the accept loop, which consults it for
//! backpressure before accepting, and into each worker through an RAII
//! guard that releases the slot however the worker exits.

use std::sync::{Arc, Mutex, PoisonError};

/// Counts live connections against a configured ceiling.
#[derive(Debug)]
pub struct ConnectionRegistry {
    active: Mutex<usize>,
    max_clients: usize,
}

impl ConnectionRegistry {
    /// Builds a registry admitting at most `max_clients` connections.
    #[must_use]
    pub const fn new(max_clients: usize) -> Self {
        Self {
            active: Mutex::new(0),
            max_clients,
        }
    }

    /// Connections currently registered.
    #[must_use]
    pub fn active(&self) -> usize {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether another connection may be accepted.
    ///
    /// The ceiling is best-effort: the accept loop checks before accepting,
    /// so a connection racing past the check is tolerated rather than
    /// rejected mid-handshake.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.active() < self.max_clients
    }

    /// Configured ceiling.
    #[must_use]
    pub const fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Registers a connection, returning a guard that releases the slot on
    /// drop.
    pub(crate) fn register(self: &Arc<Self>) -> ConnectionGuard {
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            *active += 1;
        }
        ConnectionGuard {
            registry: Arc::clone(self),
        }
    }
}

/// RAII slot held by a connection worker for its lifetime.
pub(crate) struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut active = self
            .registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *active = active.saturating_sub(1);
    }
}
