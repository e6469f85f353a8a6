// WebSocket sessions against a real listener, driven by a tungstenite client.

use futures_util::{SinkExt, StreamExt};
use govcast_core::GovcastConfig;
use govcast_gateway::app::{build_router, AppState};
use govcast_hub::identity::{issue_token, Claims};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(config: GovcastConfig) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    let router = build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("socket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

/// Read until the server ends the session. Returns whether a Close frame arrived.
async fn until_closed(ws: &mut Client) -> bool {
    timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return false,
            }
        }
    })
    .await
    .expect("server never closed the session")
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !cond() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn welcome_then_subscribe_then_receive() {
    let (addr, state) = serve(GovcastConfig::default()).await;
    let mut ws = connect(addr).await;

    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["event"], "system:message");
    assert_eq!(welcome["data"]["message"], "connected");
    assert_eq!(welcome["data"]["data"]["authenticated"], false);
    assert_eq!(welcome["data"]["data"]["address"], "anonymous");
    assert!(welcome["data"]["data"]["connectionId"].is_string());

    send(&mut ws, json!({"event": "subscribe", "data": "treasury:deposit"})).await;
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["event"], "subscribed");
    assert_eq!(ack["data"]["channels"], json!(["treasury:deposit"]));

    let report = state
        .emitter
        .emit(
            "treasury:deposit",
            json!({
                "source": "0xabc",
                "amount": "100",
                "totalBalance": "500",
                "transactionHash": "0xdef",
                "timestamp": "2024-01-01T00:00:00.000Z"
            }),
        )
        .unwrap();
    assert_eq!(report.delivered, 1);

    let event = next_json(&mut ws).await;
    assert_eq!(event["event"], "treasury:deposit");
    assert_eq!(event["data"]["amount"], "100");
    assert_eq!(event["data"]["channel"], "treasury:deposit");
}

#[tokio::test]
async fn malformed_frame_gets_error_and_session_continues() {
    let (addr, _state) = serve(GovcastConfig::default()).await;
    let mut ws = connect(addr).await;
    next_json(&mut ws).await;

    ws.send(Message::text("not json")).await.unwrap();
    let err = next_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["data"]["code"], "PROTOCOL_ERROR");

    send(&mut ws, json!({"event": "subscribe", "data": ["treasury:nope"]})).await;
    let err = next_json(&mut ws).await;
    assert_eq!(err["data"]["code"], "INVALID_CHANNEL");
    assert_eq!(err["data"]["validChannels"].as_array().unwrap().len(), 10);

    send(&mut ws, json!({"event": "ping"})).await;
    assert_eq!(next_json(&mut ws).await["event"], "pong");
}

#[tokio::test]
async fn strict_rate_limit_disconnects() {
    let mut config = GovcastConfig::default();
    config.rate_limit.max_events = 1;
    config.rate_limit.disconnect_on_violation = true;
    let (addr, state) = serve(config).await;
    let mut ws = connect(addr).await;
    next_json(&mut ws).await;

    send(&mut ws, json!({"event": "ping"})).await;
    assert_eq!(next_json(&mut ws).await["event"], "pong");

    send(&mut ws, json!({"event": "ping"})).await;
    let err = next_json(&mut ws).await;
    assert_eq!(err["data"]["code"], "RATE_LIMITED");

    until_closed(&mut ws).await;
    wait_until(|| state.hub.connection_count() == 0).await;
    assert_eq!(state.hub.health().active_connections, 0);
}

#[tokio::test]
async fn heartbeat_timeout_tears_down_silent_client() {
    let mut config = GovcastConfig::default();
    config.server.ping_interval_ms = 50;
    config.server.ping_timeout_ms = 100;
    let (addr, state) = serve(config).await;
    let mut ws = connect(addr).await;
    next_json(&mut ws).await;

    send(&mut ws, json!({"event": "subscribe", "data": ["elections:vote"]})).await;
    next_json(&mut ws).await;
    assert_eq!(state.hub.connection_count(), 1);

    // stop reading: pings go unanswered
    wait_until(|| state.hub.connection_count() == 0).await;
    assert!(state.hub.has_no_orphans());
    assert_eq!(state.hub.metrics().channel_subscribers["elections:vote"], 0);

    // no close handshake on liveness failure, the stream just ends
    assert!(!until_closed(&mut ws).await);
}

#[tokio::test]
async fn shutdown_notifies_then_closes() {
    let (addr, state) = serve(GovcastConfig::default()).await;
    let mut ws = connect(addr).await;
    next_json(&mut ws).await;

    let drain = {
        let state = state.clone();
        tokio::spawn(async move { state.manager.shutdown(Duration::from_secs(5)).await })
    };

    let notice = next_json(&mut ws).await;
    assert_eq!(notice["event"], "system:message");
    assert_eq!(notice["data"]["message"], "Server is shutting down");
    assert!(until_closed(&mut ws).await);

    let report = drain.await.unwrap();
    assert_eq!(report.notified, 1);
    assert!(report.drained);
    assert_eq!(report.forced, 0);
}

#[tokio::test]
async fn disallowed_origin_is_refused() {
    let mut config = GovcastConfig::default();
    config.server.allowed_origins = vec!["https://portal.example.edu".into()];
    let (addr, state) = serve(config).await;

    let mut req = format!("ws://{addr}/ws").into_client_request().unwrap();
    req.headers_mut()
        .insert("origin", "https://elsewhere.example".parse().unwrap());
    match connect_async(req).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), 403),
        other => panic!("expected 403, got {:?}", other.map(|(_, r)| r.status())),
    }
    assert_eq!(state.hub.health().total_connections, 0);
}

#[tokio::test]
async fn token_policy_applies_at_handshake() {
    let mut config = GovcastConfig::default();
    config.auth.jwt_secret = Some("portal-secret".into());
    config.auth.reject_invalid_tokens = true;
    let (addr, _state) = serve(config).await;

    match connect_async(format!("ws://{addr}/ws?token=garbage")).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), 401),
        other => panic!("expected 401, got {:?}", other.map(|(_, r)| r.status())),
    }

    let token = issue_token(
        b"portal-secret",
        &Claims {
            address: Some("0xBEEF".into()),
            ..Default::default()
        },
    )
    .unwrap();
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws?token={token}"))
        .await
        .unwrap();
    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["data"]["data"]["authenticated"], true);
    assert_eq!(welcome["data"]["data"]["address"], "0xbeef");
}
