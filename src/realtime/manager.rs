//! Connection manager for the real-time channel
//!
//! Tracks every live connection and the user identities each one has
//! joined. The binding table is process-local and volatile: it is rebuilt
//! as clients connect, join and disconnect, and never persisted.

use super::connection::{Connection, Delivery};
use super::message::Message;
use crate::error::{JobError, Result};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared handle to a registered connection
pub type ConnectionHandle = Arc<Connection>;

/// Live connections and their user bindings
///
/// Cheap to clone; clones share the same tables.
#[derive(Clone)]
pub struct ConnectionManager {
    /// Connection id to connection
    connections: Arc<DashMap<String, ConnectionHandle>>,
    /// User id to the ids of the connections bound to it
    users: Arc<DashMap<String, HashSet<String>>>,
    /// Connection id to the users it has joined, for cleanup on disconnect
    joined: Arc<DashMap<String, HashSet<String>>>,
    /// Maximum number of connections allowed (0 = unlimited)
    max_connections: usize,
    /// Slots reserved against `max_connections`
    active: Arc<AtomicUsize>,
    total_connections: Arc<AtomicU64>,
    total_deliveries: Arc<AtomicU64>,
    dropped_deliveries: Arc<AtomicU64>,
}

impl ConnectionManager {
    /// Create a new connection manager with unlimited connections
    pub fn new() -> Self {
        Self::with_max_connections(0)
    }

    /// Create a new connection manager with a maximum connection limit (0 = unlimited)
    pub fn with_max_connections(max_connections: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            users: Arc::new(DashMap::new()),
            joined: Arc::new(DashMap::new()),
            max_connections,
            active: Arc::new(AtomicUsize::new(0)),
            total_connections: Arc::new(AtomicU64::new(0)),
            total_deliveries: Arc::new(AtomicU64::new(0)),
            dropped_deliveries: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a new connection
    ///
    /// Fails with `ConnectionLimit` when the limit is reached. Concurrent
    /// registrations never overshoot the limit.
    pub fn register(&self, conn: ConnectionHandle) -> Result<()> {
        if self.max_connections > 0 {
            let reserved = self
                .active
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < self.max_connections).then_some(n + 1)
                });
            if reserved.is_err() {
                return Err(JobError::ConnectionLimit(self.max_connections));
            }
        } else {
            self.active.fetch_add(1, Ordering::AcqRel);
        }

        let conn_id = conn.id().to_string();
        if self.connections.insert(conn_id.clone(), conn).is_some() {
            // Re-registration under the same id keeps a single slot
            self.active.fetch_sub(1, Ordering::AcqRel);
        }
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(conn_id = %conn_id, "Connection registered");
        Ok(())
    }

    /// Unregister a connection and drop all its bindings
    pub fn unregister(&self, conn_id: &str) {
        if self.connections.remove(conn_id).is_none() {
            return;
        }
        self.active.fetch_sub(1, Ordering::AcqRel);
        self.drop_bindings(conn_id);
        tracing::debug!(conn_id = %conn_id, "Connection unregistered");
    }

    fn drop_bindings(&self, conn_id: &str) {
        if let Some((_, users)) = self.joined.remove(conn_id) {
            for user_id in users {
                self.remove_binding(&user_id, conn_id);
            }
        }
    }

    /// Get a connection by ID
    pub fn get(&self, conn_id: &str) -> Option<ConnectionHandle> {
        self.connections.get(conn_id).map(|entry| entry.clone())
    }

    /// Bind a registered connection to a user identity
    ///
    /// Returns false if the connection is unknown.
    pub fn bind(&self, conn_id: &str, user_id: &str) -> bool {
        if !self.connections.contains_key(conn_id) {
            return false;
        }
        self.users
            .entry(user_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
        self.joined
            .entry(conn_id.to_string())
            .or_default()
            .insert(user_id.to_string());

        // An unregister may have run between the check and the inserts
        if !self.connections.contains_key(conn_id) {
            self.drop_bindings(conn_id);
            self.remove_binding(user_id, conn_id);
            return false;
        }
        true
    }

    /// Remove one binding of a connection
    pub fn unbind(&self, conn_id: &str, user_id: &str) {
        if let Some(mut users) = self.joined.get_mut(conn_id) {
            users.remove(user_id);
        }
        self.remove_binding(user_id, conn_id);
    }

    /// Remove every binding of a connection, keeping it registered
    pub fn unbind_all(&self, conn_id: &str) {
        if let Some(mut users) = self.joined.get_mut(conn_id) {
            let users: Vec<String> = users.drain().collect();
            for user_id in users {
                self.remove_binding(&user_id, conn_id);
            }
        }
    }

    fn remove_binding(&self, user_id: &str, conn_id: &str) {
        if let Some(mut conns) = self.users.get_mut(user_id) {
            conns.remove(conn_id);
            if conns.is_empty() {
                drop(conns);
                self.users.remove_if(user_id, |_, conns| conns.is_empty());
            }
        }
    }

    /// Ids of the connections bound to a user
    pub fn user_connections(&self, user_id: &str) -> Vec<String> {
        self.users
            .get(user_id)
            .map(|entry| entry.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Deliver a message to every connection bound to a user
    ///
    /// Returns the number of connections the message was queued for. Closed
    /// connections are cleaned up; full ones drop the message.
    pub fn send_to_user(&self, user_id: &str, msg: &Message) -> usize {
        let conn_ids = self.user_connections(user_id);
        self.deliver(conn_ids, msg)
    }

    /// Deliver a message to every live connection
    pub fn broadcast(&self, msg: &Message) -> usize {
        let conn_ids: Vec<String> = self.connections.iter().map(|entry| entry.key().clone()).collect();
        self.deliver(conn_ids, msg)
    }

    fn deliver(&self, conn_ids: Vec<String>, msg: &Message) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for conn_id in conn_ids {
            let Some(conn) = self.get(&conn_id) else {
                continue;
            };
            match conn.try_deliver(msg.clone()) {
                Delivery::Sent => delivered += 1,
                Delivery::Full => {
                    self.dropped_deliveries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(conn_id = %conn_id, "Connection queue full, message dropped");
                }
                Delivery::Closed => closed.push(conn_id),
            }
        }

        for conn_id in closed {
            self.unregister(&conn_id);
        }

        self.total_deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    /// Get the number of active connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of users with at least one bound connection
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Get the maximum number of connections allowed (0 = unlimited)
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn metrics(&self) -> ConnectionMetrics {
        ConnectionMetrics {
            active_connections: self.connection_count(),
            max_connections: self.max_connections,
            bound_users: self.user_count(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            total_deliveries: self.total_deliveries.load(Ordering::Relaxed),
            dropped_deliveries: self.dropped_deliveries.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection metrics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionMetrics {
    pub active_connections: usize,
    /// 0 = unlimited
    pub max_connections: usize,
    pub bound_users: usize,
    /// Connections ever registered
    pub total_connections: u64,
    /// Messages queued to connections
    pub total_deliveries: u64,
    /// Messages dropped because a client's queue was full
    pub dropped_deliveries: u64,
}
