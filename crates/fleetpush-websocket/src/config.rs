//! Configuration types for the WebSocket transport.

use std::time::Duration;

use fleetpush_transport_traits::{TransportError, TransportResult};

/// Default maximum frame size (16MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default time allowed for the TCP + WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`WebSocketTransport`](crate::WebSocketTransport)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// WebSocket URL to connect to (`ws://` or `wss://`)
    pub url: String,

    /// Maximum frame size in either direction, `None` for unlimited
    pub max_message_size: Option<usize>,

    /// Handshake timeout
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3008".to_string(),
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl WebSocketConfig {
    /// Create client configuration with URL
    pub fn client(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set maximum message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Remove the message size limit
    pub fn without_message_limit(mut self) -> Self {
        self.max_message_size = None;
        self
    }

    /// Set handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Checks that the URL is an absolute `ws`/`wss` URL and the limits are sane.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConfigurationError`] describing the first problem found.
    pub fn validate(&self) -> TransportResult<()> {
        let url = url::Url::parse(&self.url).map_err(|e| {
            TransportError::ConfigurationError(format!("invalid url {:?}: {e}", self.url))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::ConfigurationError(format!(
                "unsupported scheme {:?}, expected ws or wss",
                url.scheme()
            )));
        }
        if self.max_message_size == Some(0) {
            return Err(TransportError::ConfigurationError(
                "max_message_size must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(TransportError::ConfigurationError(
                "connect_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WebSocketConfig::default();
        assert_eq!(config.url, "ws://localhost:3008");
        assert_eq!(config.max_message_size, Some(16 * 1024 * 1024));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = WebSocketConfig::client("wss://push.example.com/ws")
            .with_max_message_size(1024)
            .with_connect_timeout(Duration::from_secs(2));
        assert_eq!(config.max_message_size, Some(1024));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(config.validate().is_ok());
        assert_eq!(config.without_message_limit().max_message_size, None);
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(WebSocketConfig::client("localhost:3008").validate().is_err());
        assert!(WebSocketConfig::client("http://localhost:3008").validate().is_err());
        assert!(
            WebSocketConfig::client("ws://localhost:3008")
                .with_connect_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
