use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GovcastError, Result};

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_CONFIG_PATH: &str = "govcast.toml";
pub const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;
pub const MAX_FRAME_BYTES: usize = 16 * 1024; // client frames are tiny: subscribe lists and pings

/// Top-level config (govcast.toml + GOVCAST_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovcastConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins accepted on the WS handshake. `"*"` accepts any origin.
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,
    /// Hard deadline for draining connections on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
    /// Per-connection outbound queue depth. Messages beyond it are dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    #[serde(default = "default_max_frame")]
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            allowed_origins: default_origins(),
            ping_interval_ms: default_ping_interval(),
            ping_timeout_ms: default_ping_timeout(),
            shutdown_timeout_ms: default_shutdown_timeout(),
            outbound_buffer: default_outbound_buffer(),
            max_frame_bytes: default_max_frame(),
        }
    }
}

impl ServerConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Whether a handshake `Origin` header is acceptable.
    /// A missing header (non-browser client) is always accepted.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        self.allowed_origins
            .iter()
            .any(|o| o == "*" || o.trim_end_matches('/') == origin.trim_end_matches('/'))
    }
}

/// Inbound operation budget per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_max")]
    pub max_events: u32,
    #[serde(default = "default_rate_window")]
    pub window_ms: u64,
    /// Close the connection on the first violation instead of only
    /// rejecting the operation.
    #[serde(default)]
    pub disconnect_on_violation: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: default_rate_max(),
            window_ms: default_rate_window(),
            disconnect_on_violation: false,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 shared secret used to verify connection tokens.
    /// Without it every presented token counts as invalid.
    pub jwt_secret: Option<String>,
    /// Refuse the handshake when a token is present but invalid.
    /// Off by default: invalid tokens downgrade to anonymous.
    #[serde(default)]
    pub reject_invalid_tokens: bool,
}

/// Upstream event ingest (POST /internal/events/{channel}).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Bearer token the indexer must present. Ingest is disabled when unset.
    pub token: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}
fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}
fn default_shutdown_timeout() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}
fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}
fn default_max_frame() -> usize {
    MAX_FRAME_BYTES
}
fn default_rate_max() -> u32 {
    DEFAULT_RATE_LIMIT_MAX
}
fn default_rate_window() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_MS
}

impl GovcastConfig {
    /// Load config: built-in defaults, then the TOML file, then `GOVCAST_*`
    /// env vars. Nested keys use a double underscore, e.g.
    /// `GOVCAST_RATE_LIMIT__MAX_EVENTS=50`.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        tracing::debug!(path, exists = std::path::Path::new(path).exists(), "loading config");

        let config: GovcastConfig = Self::figment(path)
            .extract()
            .map_err(|e| GovcastError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(GovcastConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GOVCAST_").split("__"))
    }

    /// Reject settings that would make the limiter or liveness checks meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_events == 0 {
            return Err(GovcastError::Config("rate_limit.max_events must be > 0".into()));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(GovcastError::Config("rate_limit.window_ms must be > 0".into()));
        }
        if self.server.ping_interval_ms == 0 {
            return Err(GovcastError::Config("server.ping_interval_ms must be > 0".into()));
        }
        if self.server.ping_timeout_ms < self.server.ping_interval_ms {
            return Err(GovcastError::Config(format!(
                "server.ping_timeout_ms ({}) must be >= server.ping_interval_ms ({})",
                self.server.ping_timeout_ms, self.server.ping_interval_ms
            )));
        }
        if self.server.outbound_buffer == 0 {
            return Err(GovcastError::Config("server.outbound_buffer must be > 0".into()));
        }
        Ok(())
    }
}
