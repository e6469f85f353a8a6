use axum::extract::ws::{Message, WebSocket};
use futures_util::{stream::SplitSink, SinkExt};
use govcast_protocol::frames::OutboundFrame;

pub type WsSink = SplitSink<WebSocket, Message>;

/// Serialize a frame and send it over the WS connection.
pub async fn frame(tx: &mut WsSink, frame: &OutboundFrame) -> Result<(), axum::Error> {
    text(tx, frame.to_json()).await
}

pub async fn text(tx: &mut WsSink, text: String) -> Result<(), axum::Error> {
    tx.send(Message::Text(text.into())).await
}
