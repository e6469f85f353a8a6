use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovcastError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid channel(s): {}", invalid.join(", "))]
    InvalidChannel { invalid: Vec<String> },

    #[error("Rate limit exceeded: max {max} operations per {window_ms}ms")]
    RateLimited { max: u32, window_ms: u64 },

    #[error("Connection not found: {id}")]
    UnknownConnection { id: String },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GovcastError {
    /// Short error code string sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            GovcastError::Config(_) => "CONFIG_ERROR",
            GovcastError::AuthFailed(_) => "AUTH_FAILED",
            GovcastError::Protocol(_) => "PROTOCOL_ERROR",
            GovcastError::InvalidChannel { .. } => "INVALID_CHANNEL",
            GovcastError::RateLimited { .. } => "RATE_LIMITED",
            GovcastError::UnknownConnection { .. } => "UNKNOWN_CONNECTION",
            GovcastError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            GovcastError::Serialization(_) => "SERIALIZATION_ERROR",
            GovcastError::Io(_) => "IO_ERROR",
            GovcastError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, GovcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_channel_message_lists_every_name() {
        let err = GovcastError::InvalidChannel {
            invalid: vec!["foo".into(), "bar:baz".into()],
        };
        assert_eq!(err.to_string(), "Invalid channel(s): foo, bar:baz");
        assert_eq!(err.code(), "INVALID_CHANNEL");
    }

    #[test]
    fn rate_limited_message_names_budget() {
        let err = GovcastError::RateLimited {
            max: 100,
            window_ms: 60_000,
        };
        assert!(err.to_string().contains("100"));
        assert_eq!(err.code(), "RATE_LIMITED");
    }
}
