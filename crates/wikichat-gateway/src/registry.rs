use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Pre-serialized frame queued for one connection.
pub type Payload = Arc<str>;

/// Bounded delivery queue feeding one connection's writer task.
pub type Outbound = mpsc::Sender<Payload>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The set of currently deliverable connections.
///
/// Guarded by a std `RwLock` rather than an async one, since the lock is only
/// held to copy or insert and never across an await or a send.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, Outbound>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, outbound: Outbound) -> ConnectionId {
        let id = ConnectionId::new();
        let count = {
            let mut conns = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            conns.insert(id, outbound);
            conns.len()
        };
        debug!("Registered connection {} ({} live)", id, count);
        id
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            debug!("Unregistered connection {}", id);
        }
        removed
    }

    /// Copy of the current membership, taken under a short read lock.
    pub fn snapshot(&self) -> Vec<(ConnectionId, Outbound)> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register and return a guard that unregisters on drop.
    pub fn register_scoped(&self, outbound: Outbound) -> Registration {
        let id = self.register(outbound);
        Registration {
            registry: self.clone(),
            id,
        }
    }
}

/// Owns one registry slot for the lifetime of a connection task.
pub struct Registration {
    registry: ConnectionRegistry,
    id: ConnectionId,
}

impl Registration {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
