use axum::{extract::State, Json};
use govcast_core::Channel;
use govcast_hub::MetricsSnapshot;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with the headline counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let health = state.hub.health();
    Json(json!({
        "connected": health.connected,
        "activeConnections": health.active_connections,
        "totalConnections": health.total_connections,
        "totalEvents": health.total_events,
        "version": env!("CARGO_PKG_VERSION"),
        "build": env!("GOVCAST_GIT_SHA"),
    }))
}

/// GET /metrics: health counters plus per-channel emissions and subscribers.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.hub.metrics())
}

/// GET /channels: the fixed channel set, for client discovery.
pub async fn channels_handler() -> Json<Value> {
    let channels: Vec<Value> = Channel::ALL
        .iter()
        .map(|c| json!({ "name": c.as_str(), "category": c.category() }))
        .collect();
    Json(json!({ "channels": channels }))
}
