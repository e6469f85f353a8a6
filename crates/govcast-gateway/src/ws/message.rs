use govcast_core::GovcastError;
use govcast_hub::{ConnectionId, ConnectionManager, Reply};
use govcast_protocol::frames::{InboundFrame, OutboundFrame};
use tracing::debug;

/// Process one inbound WS text frame and produce the reply to send back.
pub fn handle(conn_id: &ConnectionId, text: &str, manager: &ConnectionManager, max_bytes: usize) -> Reply {
    manager.touch(conn_id);

    if text.len() > max_bytes {
        let err = GovcastError::PayloadTooLarge {
            size: text.len(),
            max: max_bytes,
        };
        return Reply {
            frame: OutboundFrame::error(&err),
            disconnect: true,
        };
    }

    match InboundFrame::parse(text) {
        Ok(request) => {
            debug!(conn_id = %conn_id, op = request.name(), "client operation");
            manager.handle(conn_id, request)
        }
        Err(err) => {
            debug!(conn_id = %conn_id, error = %err, "malformed frame");
            Reply {
                frame: OutboundFrame::error(&err),
                disconnect: false,
            }
        }
    }
}
