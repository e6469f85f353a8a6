use axum::http::{header, HeaderMap, StatusCode};
use govcast_core::config::ServerConfig;
use govcast_hub::{ConnectionId, Identity, IdentityResolver};
use govcast_protocol::frames::OutboundFrame;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// Query parameters accepted on `GET /ws`.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub token: Option<String>,
}

/// Token from `?token=`, falling back to `Authorization: Bearer`.
pub fn extract_credential(query: &HandshakeQuery, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query.token.as_deref().filter(|t| !t.trim().is_empty()) {
        return Some(token.to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Decide whether the upgrade may proceed and with which identity.
pub fn authorize(
    server: &ServerConfig,
    resolver: &IdentityResolver,
    query: &HandshakeQuery,
    headers: &HeaderMap,
) -> Result<Identity, (StatusCode, String)> {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !server.origin_allowed(origin) {
        warn!(origin = origin.unwrap_or_default(), "handshake from disallowed origin");
        return Err((StatusCode::FORBIDDEN, "origin not allowed".to_string()));
    }

    let credential = extract_credential(query, headers);
    resolver
        .admit(resolver.resolve(credential.as_deref()))
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))
}

/// First frame on every connection.
pub fn welcome_frame(conn_id: &ConnectionId, identity: &Identity) -> OutboundFrame {
    OutboundFrame::system(
        "connected",
        Some(json!({
            "connectionId": conn_id.as_str(),
            "authenticated": identity.is_authenticated(),
            "address": identity.label(),
        })),
    )
}
