//! Client configuration.
//!
//! Durations are stored as milliseconds on the wire (`*_ms` keys) so the same
//! struct loads from TOML/YAML/JSON files and `FLEETPUSH_*` environment
//! variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fleetpush_websocket::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE, WebSocketConfig};

use crate::error::{ClientError, ClientResult};

/// Default server endpoint
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3008";

/// Prefix for environment overrides, e.g. `FLEETPUSH_SERVER_URL`
pub const ENV_PREFIX: &str = "FLEETPUSH";

/// Configuration for a [`PubSubClient`](crate::PubSubClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the pub/sub server
    pub server_url: String,
    /// Connect as soon as the client is constructed
    pub auto_connect: bool,
    /// Fixed delay between automatic reconnect attempts
    #[serde(rename = "reconnect_interval_ms", with = "duration_ms")]
    pub reconnect_interval: Duration,
    /// Ping period while registered. Zero disables the heartbeat.
    #[serde(rename = "heartbeat_interval_ms", with = "duration_ms")]
    pub heartbeat_interval: Duration,
    /// Consecutive abnormal closes tolerated before giving up
    pub max_reconnect_attempts: u32,
    /// Timeout for publish/subscribe/unsubscribe/status/users
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
    /// Timeout for the register round trip
    #[serde(rename = "register_timeout_ms", with = "duration_ms")]
    pub register_timeout: Duration,
    /// How long `connect()` waits for registration
    #[serde(rename = "connect_wait_timeout_ms", with = "duration_ms")]
    pub connect_wait_timeout: Duration,
    /// Re-issue subscribe for every registered topic after re-registration
    pub resubscribe_on_reconnect: bool,
    /// Largest frame sent or accepted, in bytes. `None` lifts the limit.
    pub max_message_size: Option<usize>,
    /// Time allowed for the TCP and WebSocket handshake
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            auto_connect: true,
            reconnect_interval: Duration::from_millis(3000),
            heartbeat_interval: Duration::from_millis(30_000),
            max_reconnect_attempts: 10,
            request_timeout: Duration::from_millis(5000),
            register_timeout: Duration::from_millis(5000),
            connect_wait_timeout: Duration::from_millis(10_000),
            resubscribe_on_reconnect: true,
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Load from an optional file, then apply `FLEETPUSH_*` environment overrides.
    ///
    /// The file format is inferred from the extension. A missing `path` means
    /// defaults plus environment only.
    ///
    /// # Errors
    ///
    /// [`ClientError::Config`] if the file is missing or malformed, a value has
    /// the wrong type, or the result fails [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot run with.
    ///
    /// # Errors
    ///
    /// [`ClientError::Config`] naming the first offending key.
    pub fn validate(&self) -> ClientResult<()> {
        if self.server_url.trim().is_empty() {
            return Err(ClientError::Config("server_url must not be empty".into()));
        }
        for (name, value) in [
            ("request_timeout_ms", self.request_timeout),
            ("register_timeout_ms", self.register_timeout),
            ("connect_wait_timeout_ms", self.connect_wait_timeout),
            ("connect_timeout_ms", self.connect_timeout),
        ] {
            if value.is_zero() {
                return Err(ClientError::Config(format!("{name} must be positive")));
            }
        }
        if self.max_message_size == Some(0) {
            return Err(ClientError::Config("max_message_size must be positive".into()));
        }
        Ok(())
    }

    /// Transport settings derived from this configuration.
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            url: self.server_url.clone(),
            max_message_size: self.max_message_size,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Set the server endpoint
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Enable or disable connecting on construction
    pub fn with_auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    /// Set the reconnect delay
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the heartbeat period
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the reconnect budget
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the register timeout
    pub fn with_register_timeout(mut self, timeout: Duration) -> Self {
        self.register_timeout = timeout;
        self
    }

    /// Set how long `connect()` waits for registration
    pub fn with_connect_wait_timeout(mut self, timeout: Duration) -> Self {
        self.connect_wait_timeout = timeout;
        self
    }

    /// Enable or disable re-subscription after reconnect
    pub fn with_resubscribe_on_reconnect(mut self, enabled: bool) -> Self {
        self.resubscribe_on_reconnect = enabled;
        self
    }

    /// Set the frame size limit, `None` for unlimited
    pub fn with_max_message_size(mut self, size: Option<usize>) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
