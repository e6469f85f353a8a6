//! Upstream ingest: POST /internal/events/{channel}.
//!
//! The indexer posts one JSON object per on-chain event. The request is
//! authenticated with the configured bearer token, the body is checked
//! against the channel's payload shape, then fanned out.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use govcast_core::Channel;
use govcast_protocol::DomainEvent;
use serde_json::{json, Value};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::app::AppState;

type IngestError = (StatusCode, Json<Value>);

pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    Path(channel_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, IngestError> {
    let Some(expected) = state.config().ingest.token.as_deref() else {
        warn!(channel = %channel_name, "event posted but ingest is disabled");
        return Err(error(StatusCode::SERVICE_UNAVAILABLE, "ingest is disabled"));
    };

    verify_bearer_token(&headers, expected).map_err(|reason| {
        warn!(%reason, "ingest authentication failed");
        error(StatusCode::UNAUTHORIZED, "authentication failed")
    })?;

    let channel = Channel::from_name(&channel_name).ok_or_else(|| {
        warn!(channel = %channel_name, "ingest for unregistered channel");
        error(StatusCode::NOT_FOUND, "unknown channel")
    })?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| error(StatusCode::BAD_REQUEST, "invalid JSON body"))?;
    if !payload.is_object() {
        return Err(error(StatusCode::BAD_REQUEST, "body must be a JSON object"));
    }

    let event = DomainEvent::from_parts(channel, payload).map_err(|e| {
        warn!(%channel, error = %e, "ingest payload does not match channel shape");
        error(
            StatusCode::UNPROCESSABLE_ENTITY,
            &format!("payload does not match {channel}: {e}"),
        )
    })?;

    let report = state.emitter.emit_event(event);
    debug!(%channel, recipients = report.recipients, "ingested event");
    Ok(Json(json!({
        "ok": true,
        "channel": channel,
        "recipients": report.recipients,
        "delivered": report.delivered,
    })))
}

/// Verify `Authorization: Bearer <token>` against the configured token.
fn verify_bearer_token(headers: &HeaderMap, expected: &str) -> Result<(), String> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing Authorization header".to_string())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}

fn error(status: StatusCode, message: &str) -> IngestError {
    (status, Json(json!({ "error": message })))
}
