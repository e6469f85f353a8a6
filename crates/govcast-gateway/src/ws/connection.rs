use axum::{
    body::Bytes,
    extract::{ws::Message, ws::WebSocket, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use govcast_core::GovcastError;
use govcast_hub::{Outbound, OpenedConnection};
use govcast_protocol::frames::OutboundFrame;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::handshake::{self, HandshakeQuery};
use crate::ws::{message, send};

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
///
/// Origin and credential checks run before the upgrade so a rejected client
/// gets a plain HTTP status instead of a socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let identity = match handshake::authorize(
        &state.config().server,
        state.hub.identity(),
        &query,
        &headers,
    ) {
        Ok(identity) => identity,
        Err(rejection) => return rejection.into_response(),
    };

    let max_frame = state.config().server.max_frame_bytes;
    ws.max_message_size(max_frame.saturating_mul(2))
        .on_upgrade(move |socket| {
            let opened = state.manager.open(identity);
            run_connection(socket, opened, state)
        })
}

/// Per-connection event loop: lives for the entire WS session.
async fn run_connection(socket: WebSocket, opened: OpenedConnection, state: Arc<AppState>) {
    let OpenedConnection {
        id: conn_id,
        identity,
        outbound: mut outbound_rx,
    } = opened;
    let manager = &state.manager;
    let server = &state.config().server;

    let (mut tx, mut rx) = socket.split();

    if send::frame(&mut tx, &handshake::welcome_frame(&conn_id, &identity))
        .await
        .is_err()
    {
        manager.close(&conn_id);
        return;
    }

    let mut tick = tokio::time::interval(server.ping_interval());
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // first tick completes immediately
    tick.tick().await;

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = message::handle(&conn_id, text.as_str(), manager, server.max_frame_bytes);
                        if send::frame(&mut tx, &reply.frame).await.is_err() || reply.disconnect {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        manager.touch(&conn_id);
                        let err = GovcastError::Protocol("binary frames are not supported".into());
                        if send::frame(&mut tx, &OutboundFrame::error(&err)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        manager.touch(&conn_id);
                        if tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => manager.touch(&conn_id),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(conn_id = %conn_id, error = %e, "socket read error");
                        break;
                    }
                }
            }

            out = outbound_rx.recv() => {
                match out {
                    Some(Outbound::Frame(text)) => {
                        if send::text(&mut tx, text.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                if manager.is_expired(&conn_id) {
                    warn!(conn_id = %conn_id, "heartbeat timeout");
                    break;
                }
                if tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    manager.close(&conn_id);
    info!(conn_id = %conn_id, "WS connection closed");
}
