//! Live subscriber registry.
//!
//! Maps each group id to the WebSocket connections currently listening on it.
//! The registry only holds a [`Subscriber`] handle (the sending half of the
//! connection's outbound queue); the socket itself stays owned by its
//! subscription task, so nothing here can close a connection.
//!
//! The lock is held only while the map is mutated or copied. Pushing frames
//! always happens on a [`snapshot`](SubscriberRegistry::snapshot) taken
//! outside the lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier of one live connection.
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
        write!(f, "{}", self.0)
    }
}

/// Why a push to a subscriber did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The connection's outbound queue is full (slow reader).
    Full,
    /// The connection has already shut down.
    Closed,
}

/// Non-owning handle to a live connection, used only for pushing frames.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<str>>,
}

impl Subscriber {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame without waiting.
    pub fn push(&self, frame: Arc<str>) -> Result<(), PushError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Full,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }
}

/// Concurrency-safe group id -> subscribers map.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    groups: Arc<Mutex<HashMap<i64, Vec<Subscriber>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to a group. Each connection must be registered once.
    pub fn register(&self, group_id: i64, subscriber: Subscriber) {
        let mut groups = self.groups.lock();
        groups.entry(group_id).or_default().push(subscriber);
    }

    /// Remove one entry for `id` from the group. Returns `false` (and does
    /// nothing) when no such entry exists.
    pub fn unregister(&self, group_id: i64, id: ConnectionId) -> bool {
        let mut groups = self.groups.lock();
        let Some(subscribers) = groups.get_mut(&group_id) else {
            return false;
        };
        let Some(pos) = subscribers.iter().position(|s| s.id == id) else {
            return false;
        };
        subscribers.swap_remove(pos);
        if subscribers.is_empty() {
            groups.remove(&group_id);
        }
        true
    }

    /// Point-in-time copy of a group's subscribers.
    pub fn snapshot(&self, group_id: i64) -> Vec<Subscriber> {
        self.groups
            .lock()
            .get(&group_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, group_id: i64) -> usize {
        self.groups.lock().get(&group_id).map_or(0, Vec::len)
    }

    /// Number of groups with at least one subscriber, and total subscribers.
    pub fn totals(&self) -> (usize, usize) {
        let groups = self.groups.lock();
        (groups.len(), groups.values().map(Vec::len).sum())
    }
}
