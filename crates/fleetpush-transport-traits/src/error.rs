//! Transport error types.

use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// There is no open connection to send on.
    #[error("Not connected")]
    NotConnected,

    /// Failed to send a frame.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive a frame.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// A protocol-level error occurred (e.g. a binary frame that is not UTF-8).
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Connection establishment timed out.
    #[error(
        "Connection timed out after {timeout:?} for operation: {operation}. \
         If this is expected, increase the timeout with \
         `WebSocketConfig::with_connect_timeout(Duration::from_secs({}))`",
        timeout.as_secs().max(1) * 2
    )]
    ConnectionTimeout {
        /// The operation that timed out
        operation: String,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// Frame size exceeds the configured maximum.
    #[error(
        "Frame size ({size} bytes) exceeds maximum allowed ({max} bytes). \
         If this is expected, increase the limit with \
         `WebSocketConfig::with_max_message_size({})`",
        size
    )]
    FrameTooLarge {
        /// The actual size of the frame in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max: usize,
    },
}

impl TransportError {
    /// Whether the error means the connection is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::ConnectionLost(_)
                | Self::ReceiveFailed(_)
                | Self::ConnectionTimeout { .. }
                | Self::Io(_)
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Validates a frame against a size limit.
///
/// # Errors
///
/// Returns [`TransportError::FrameTooLarge`] if `size` exceeds `max`.
pub fn validate_frame_size(size: usize, max: Option<usize>) -> TransportResult<()> {
    match max {
        Some(max) if size > max => Err(TransportError::FrameTooLarge { size, max }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_frame_size() {
        assert!(validate_frame_size(10, Some(10)).is_ok());
        assert!(validate_frame_size(10, None).is_ok());
        assert_eq!(
            validate_frame_size(11, Some(10)),
            Err(TransportError::FrameTooLarge { size: 11, max: 10 })
        );
    }

    #[test]
    fn test_timeout_message_suggests_larger_timeout() {
        let err = TransportError::ConnectionTimeout {
            operation: "open".into(),
            timeout: Duration::from_secs(10),
        };
        let text = err.to_string();
        assert!(text.contains("open"));
        assert!(text.contains("from_secs(20)"));
    }

    #[test]
    fn test_is_fatal() {
        assert!(TransportError::ConnectionLost("eof".into()).is_fatal());
        assert!(TransportError::ReceiveFailed("reset".into()).is_fatal());
        assert!(!TransportError::SendFailed("full".into()).is_fatal());
        assert!(!TransportError::NotConnected.is_fatal());
        assert!(!TransportError::FrameTooLarge { size: 2, max: 1 }.is_fatal());
    }
}
