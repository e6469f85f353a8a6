use govcast_core::Channel;
use govcast_protocol::events::DomainEvent;
use govcast_protocol::frames::{now_ms, OutboundFrame};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::connection::Outbound;
use crate::hub::Hub;

/// Result of one emit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitReport {
    pub channel: Channel,
    /// Subscribers at emission time.
    pub recipients: usize,
    /// Sends that reached an outbound queue.
    pub delivered: usize,
}

/// Upstream entry point: pushes domain events to the subscribers of their channel.
#[derive(Clone)]
pub struct EventEmitter {
    hub: Arc<Hub>,
}

impl EventEmitter {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Emit `payload` on the channel named `channel_name`.
    ///
    /// An unknown channel or a non-object payload is an upstream bug: it is
    /// logged and dropped, and `None` is returned. Delivery is best-effort
    /// per subscriber; one failed send never stops the rest.
    pub fn emit(&self, channel_name: &str, payload: Value) -> Option<EmitReport> {
        let Some(channel) = Channel::from_name(channel_name) else {
            warn!(channel = channel_name, "emit to unregistered channel dropped");
            return None;
        };
        let Value::Object(map) = payload else {
            warn!(%channel, "emit with non-object payload dropped");
            return None;
        };
        Some(self.emit_to(channel, map))
    }

    /// Emit a typed event.
    pub fn emit_event(&self, event: DomainEvent) -> EmitReport {
        let channel = event.channel();
        self.emit_to(channel, event.into_payload())
    }

    /// Fan out under the hub lock so every subscriber sees one channel's
    /// events in emit order.
    pub fn emit_to(&self, channel: Channel, payload: Map<String, Value>) -> EmitReport {
        let frame = OutboundFrame::domain(channel, payload, now_ms());
        let text: Arc<str> = Arc::from(frame.to_json());

        let mut state = self.hub.lock();
        state.metrics.event_emitted(channel);

        let mut recipients = 0;
        let mut delivered = 0;
        let mut dropped = 0;
        for conn_id in state.subscriptions.iter_subscribers(channel) {
            recipients += 1;
            let Some(conn) = self.hub.connections.get(conn_id) else {
                // closed between lookup and send
                continue;
            };
            match conn.tx.try_send(Outbound::Frame(Arc::clone(&text))) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    debug!(conn_id = %conn_id, %channel, "outbound queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(conn_id = %conn_id, %channel, "connection gone, event skipped");
                }
            }
        }
        for _ in 0..dropped {
            state.metrics.message_dropped();
        }
        drop(state);

        debug!(%channel, recipients, delivered, "event emitted");
        EmitReport {
            channel,
            recipients,
            delivered,
        }
    }
}
