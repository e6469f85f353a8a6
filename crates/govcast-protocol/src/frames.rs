use chrono::{SecondsFormat, Utc};
use govcast_core::{Channel, GovcastError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Client → Server event names.
pub const SUBSCRIBE: &str = "subscribe";
pub const UNSUBSCRIBE: &str = "unsubscribe";
pub const PING: &str = "ping";

// Server → Client event names (domain channels use their own wire name).
pub const SUBSCRIBED: &str = "subscribed";
pub const UNSUBSCRIBED: &str = "unsubscribed";
pub const PONG: &str = "pong";
pub const ERROR: &str = "error";
pub const SYSTEM_MESSAGE: &str = "system:message";

/// Raw inbound frame: read the `event` discriminator first, then the body.
/// Wire: `{ "event": "subscribe", "data": ["treasury:deposit", "proposals:vote"] }`
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A single channel name or a list of them; clients may send either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelList {
    One(String),
    Many(Vec<String>),
}

impl ChannelList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ChannelList::One(name) => vec![name],
            ChannelList::Many(names) => names,
        }
    }
}

/// A decoded client operation. Channel names are still raw strings here;
/// the registry validates them as a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Ping,
}

impl ClientRequest {
    /// Operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientRequest::Subscribe(_) => SUBSCRIBE,
            ClientRequest::Unsubscribe(_) => UNSUBSCRIBE,
            ClientRequest::Ping => PING,
        }
    }
}

impl InboundFrame {
    /// Parse a text frame into a client request.
    pub fn parse(text: &str) -> Result<ClientRequest, GovcastError> {
        let frame: InboundFrame = serde_json::from_str(text)
            .map_err(|e| GovcastError::Protocol(format!("malformed frame: {e}")))?;
        frame.into_request()
    }

    pub fn into_request(self) -> Result<ClientRequest, GovcastError> {
        match self.event.as_str() {
            SUBSCRIBE => Ok(ClientRequest::Subscribe(channel_list(self.data, SUBSCRIBE)?)),
            UNSUBSCRIBE => Ok(ClientRequest::Unsubscribe(channel_list(self.data, UNSUBSCRIBE)?)),
            PING => Ok(ClientRequest::Ping),
            other => Err(GovcastError::Protocol(format!("unknown event '{other}'"))),
        }
    }
}

fn channel_list(data: Option<Value>, event: &str) -> Result<Vec<String>, GovcastError> {
    let data = data.ok_or_else(|| GovcastError::Protocol(format!("'{event}' requires channel name(s)")))?;
    let list: ChannelList = serde_json::from_value(data).map_err(|_| {
        GovcastError::Protocol(format!("'{event}' expects a channel name or an array of names"))
    })?;
    let names = list.into_vec();
    if names.is_empty() {
        return Err(GovcastError::Protocol(format!("'{event}' requires at least one channel")));
    }
    Ok(names)
}

/// Server → Client frame.
/// Wire: `{ "event": "subscribed", "data": { "channels": [...], "timestamp": "..." } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub event: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionAck {
    pub channels: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_channels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: String,
}

impl OutboundFrame {
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            event: event.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn subscribed(channels: &[Channel]) -> Self {
        Self::new(
            SUBSCRIBED,
            SubscriptionAck {
                channels: names(channels),
                timestamp: now_iso(),
            },
        )
    }

    pub fn unsubscribed(channels: &[Channel]) -> Self {
        Self::new(
            UNSUBSCRIBED,
            SubscriptionAck {
                channels: names(channels),
                timestamp: now_iso(),
            },
        )
    }

    pub fn pong() -> Self {
        Self::new(PONG, Pong { timestamp: now_iso() })
    }

    /// Error reply. Validation errors carry the full channel list so the
    /// client can correct its request.
    pub fn error(err: &GovcastError) -> Self {
        let valid_channels = match err {
            GovcastError::InvalidChannel { .. } => {
                Some(Channel::ALL.iter().map(|c| c.as_str().to_string()).collect())
            }
            _ => None,
        };
        Self::new(
            ERROR,
            ErrorPayload {
                message: err.to_string(),
                code: err.code().to_string(),
                valid_channels,
            },
        )
    }

    pub fn system(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(
            SYSTEM_MESSAGE,
            SystemMessage {
                message: message.into(),
                data,
                timestamp: now_iso(),
            },
        )
    }

    /// Domain event for `channel`: the payload merged with the canonical
    /// envelope. Envelope keys overwrite payload keys of the same name.
    pub fn domain(channel: Channel, mut payload: Map<String, Value>, emitted_at_ms: i64) -> Self {
        payload.insert("channel".into(), Value::String(channel.as_str().into()));
        payload.insert("emittedAt".into(), Value::from(emitted_at_ms));
        Self {
            event: channel.as_str().to_string(),
            data: Value::Object(payload),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn names(channels: &[Channel]) -> Vec<String> {
    channels.iter().map(|c| c.as_str().to_string()).collect()
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
