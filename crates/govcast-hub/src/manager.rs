use govcast_core::{Channel, GovcastError};
use govcast_protocol::frames::{ClientRequest, OutboundFrame};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connection::{ConnState, Connection, ConnectionId, Outbound};
use crate::hub::Hub;
use crate::identity::Identity;

pub const SHUTDOWN_NOTICE: &str = "Server is shutting down";

/// A freshly registered connection: its id and the queue the socket task drains.
#[derive(Debug)]
pub struct OpenedConnection {
    pub id: ConnectionId,
    pub identity: Identity,
    pub outbound: mpsc::Receiver<Outbound>,
}

/// Response to one client operation.
#[derive(Debug, Clone)]
pub struct Reply {
    pub frame: OutboundFrame,
    /// The caller should close the connection after sending `frame`.
    pub disconnect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections that received the shutdown notice.
    pub notified: usize,
    /// All connections closed before the deadline.
    pub drained: bool,
    /// Connections torn down by force after the deadline.
    pub forced: usize,
}

/// Owns connection lifecycles: registration, client operations, liveness,
/// teardown and process shutdown.
#[derive(Clone)]
pub struct ConnectionManager {
    hub: Arc<Hub>,
}

impl ConnectionManager {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Register a connection whose handshake succeeded (Connecting → Open).
    pub fn open(&self, identity: Identity) -> OpenedConnection {
        let (tx, rx) = mpsc::channel(self.hub.config.server.outbound_buffer);
        let id = ConnectionId::new();

        let mut record = Connection::new(id.clone(), identity.clone(), tx);
        record.state.advance(ConnState::Open);
        self.hub.connections.insert(id.clone(), record);
        self.hub.lock().metrics.connection_opened();

        info!(
            conn_id = %id,
            identity = identity.label(),
            authenticated = identity.is_authenticated(),
            "connection opened"
        );
        OpenedConnection {
            id,
            identity,
            outbound: rx,
        }
    }

    /// Record inbound activity (any frame, including pongs).
    pub fn touch(&self, conn: &ConnectionId) {
        if let Some(mut record) = self.hub.connections.get_mut(conn) {
            record.last_activity = Instant::now();
        }
    }

    pub fn state_of(&self, conn: &ConnectionId) -> ConnState {
        self.hub
            .connections
            .get(conn)
            .map_or(ConnState::Closed, |r| r.state)
    }

    pub fn is_expired(&self, conn: &ConnectionId) -> bool {
        self.is_expired_at(conn, Instant::now())
    }

    /// No inbound activity for longer than the ping timeout. Unknown
    /// connections count as expired.
    pub fn is_expired_at(&self, conn: &ConnectionId, now: Instant) -> bool {
        let timeout = self.hub.config.server.ping_timeout();
        self.hub
            .connections
            .get(conn)
            .map_or(true, |r| now.saturating_duration_since(r.last_activity) > timeout)
    }

    /// Run one client operation: rate limit, validate, apply, acknowledge.
    /// A rejected operation leaves subscription state unchanged.
    pub fn handle(&self, conn: &ConnectionId, request: ClientRequest) -> Reply {
        if !self.hub.is_connected(conn) {
            let err = GovcastError::UnknownConnection { id: conn.to_string() };
            return Reply {
                frame: OutboundFrame::error(&err),
                disconnect: true,
            };
        }
        self.touch(conn);

        let allowed = self.hub.lock().limiter.try_consume(conn, 1);
        if !allowed {
            let rl = &self.hub.config.rate_limit;
            warn!(
                conn_id = %conn,
                op = request.name(),
                disconnect = rl.disconnect_on_violation,
                "rate limit exceeded"
            );
            let err = GovcastError::RateLimited {
                max: rl.max_events,
                window_ms: rl.window_ms,
            };
            return Reply {
                frame: OutboundFrame::error(&err),
                disconnect: rl.disconnect_on_violation,
            };
        }

        let result = match request {
            ClientRequest::Subscribe(names) => self
                .subscribe(conn, &names)
                .map(|all| OutboundFrame::subscribed(&all)),
            ClientRequest::Unsubscribe(names) => self
                .unsubscribe(conn, &names)
                .map(|removed| OutboundFrame::unsubscribed(&removed)),
            ClientRequest::Ping => Ok(OutboundFrame::pong()),
        };

        match result {
            Ok(frame) => Reply {
                frame,
                disconnect: false,
            },
            Err(err) => {
                debug!(conn_id = %conn, error = %err, "operation rejected");
                Reply {
                    frame: OutboundFrame::error(&err),
                    disconnect: false,
                }
            }
        }
    }

    /// Validate the whole batch, then subscribe. Returns the full list of the
    /// connection's channels.
    pub fn subscribe<S: AsRef<str>>(
        &self,
        conn: &ConnectionId,
        names: &[S],
    ) -> Result<Vec<Channel>, GovcastError> {
        let channels = self.hub.registry.require_all(names)?;

        let mut state = self.hub.lock();
        // checked under the lock so a concurrent close cannot leave orphans
        if !self.hub.connections.contains_key(conn) {
            return Err(GovcastError::UnknownConnection { id: conn.to_string() });
        }
        let all = state.subscriptions.subscribe(conn, &channels);
        drop(state);

        info!(conn_id = %conn, channels = ?names_of(&channels), "subscribed");
        Ok(all)
    }

    /// Validate the whole batch, then unsubscribe. Returns the channels named
    /// in the request.
    pub fn unsubscribe<S: AsRef<str>>(
        &self,
        conn: &ConnectionId,
        names: &[S],
    ) -> Result<Vec<Channel>, GovcastError> {
        let channels = self.hub.registry.require_all(names)?;
        self.hub.lock().subscriptions.unsubscribe(conn, &channels);

        info!(conn_id = %conn, channels = ?names_of(&channels), "unsubscribed");
        Ok(channels)
    }

    /// Open → Closing: ask the socket task to close. Returns `false` if the
    /// connection is unknown or already closing.
    pub fn begin_close(&self, conn: &ConnectionId) -> bool {
        let queue_full = {
            let Some(mut record) = self.hub.connections.get_mut(conn) else {
                return false;
            };
            if !record.state.advance(ConnState::Closing) {
                return false;
            }
            let sent = record.tx.try_send(Outbound::Close);
            matches!(sent, Err(TrySendError::Full(_)))
        };
        // The Close marker did not fit. Drop the record now so the socket
        // task sees its queue end once it drains the backlog.
        if queue_full {
            debug!(conn_id = %conn, "outbound queue full, closing without marker");
            self.close(conn);
        }
        true
    }

    /// Closing → Closed: drop the record, every subscription edge and the
    /// rate-limit window. Idempotent.
    pub fn close(&self, conn: &ConnectionId) -> bool {
        let Some((_, mut record)) = self.hub.connections.remove(conn) else {
            return false;
        };
        record.state.advance(ConnState::Closing);

        let channels = {
            let mut state = self.hub.lock();
            let channels = state.subscriptions.remove_connection(conn);
            state.limiter.forget(conn);
            state.metrics.connection_closed();
            channels
        };
        record.state.advance(ConnState::Closed);
        self.hub.closed.notify_waiters();

        let lifetime_ms = (chrono::Utc::now() - record.created_at).num_milliseconds();
        info!(
            conn_id = %conn,
            identity = record.identity.label(),
            subscriptions = channels.len(),
            lifetime_ms,
            "connection closed"
        );
        true
    }

    /// Send a `system:message` to every open connection, subscribed or not.
    pub fn broadcast_system(&self, message: &str, data: Option<Value>) -> usize {
        let text: Arc<str> = Arc::from(OutboundFrame::system(message, data).to_json());
        let mut sent = 0;
        for record in self.hub.connections.iter() {
            if record.state == ConnState::Open
                && record.tx.try_send(Outbound::Frame(Arc::clone(&text))).is_ok()
            {
                sent += 1;
            }
        }
        sent
    }

    /// Drain all connections: notice, close request, then wait up to
    /// `deadline` before force-closing whatever is left.
    pub async fn shutdown(&self, deadline: Duration) -> ShutdownReport {
        let notified = self.broadcast_system(SHUTDOWN_NOTICE, None);

        let ids: Vec<ConnectionId> = self.hub.connections.iter().map(|r| r.key().clone()).collect();
        for id in &ids {
            self.begin_close(id);
        }
        info!(connections = ids.len(), "draining connections");

        let drained = tokio::time::timeout(deadline, self.wait_until_empty())
            .await
            .is_ok();

        let mut forced = 0;
        if !drained {
            let remaining: Vec<ConnectionId> =
                self.hub.connections.iter().map(|r| r.key().clone()).collect();
            for id in &remaining {
                if self.close(id) {
                    forced += 1;
                }
            }
            warn!(forced, "shutdown deadline exceeded, connections force-closed");
        }

        ShutdownReport {
            notified,
            drained,
            forced,
        }
    }

    async fn wait_until_empty(&self) {
        loop {
            // register before checking so a close in between is not missed
            let notified = self.hub.closed.notified();
            if self.hub.connections.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

fn names_of(channels: &[Channel]) -> Vec<&'static str> {
    channels.iter().map(|c| c.as_str()).collect()
}
