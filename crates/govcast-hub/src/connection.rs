use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::identity::Identity;

/// Unique identifier for one client connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Connection lifecycle: linear progression, no backwards transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnState {
    /// Apply a transition; moving backwards (or sideways) is ignored.
    pub fn advance(&mut self, next: ConnState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

/// What the hub pushes into a connection's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A serialized JSON text frame, shared across all recipients of a fan-out.
    Frame(Arc<str>),
    /// Ask the socket task to close the connection.
    Close,
}

/// Live connection record, owned by the hub's connection table.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    pub state: ConnState,
    pub created_at: DateTime<Utc>,
    pub last_activity: Instant,
    pub(crate) tx: mpsc::Sender<Outbound>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, identity: Identity, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            identity,
            state: ConnState::Connecting,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            tx,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_only_moves_forward() {
        let mut s = ConnState::Connecting;
        assert!(s.advance(ConnState::Open));
        assert!(s.advance(ConnState::Closing));
        assert!(!s.advance(ConnState::Open));
        assert_eq!(s, ConnState::Closing);
        assert!(s.advance(ConnState::Closed));
        assert!(!s.advance(ConnState::Closed));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
