//! Client error types.

use std::time::Duration;

use thiserror::Error;

use fleetpush_protocol::{CorrelationKey, ProtocolError, ServerMessage};
use fleetpush_transport_traits::TransportError;

use crate::state::ConnectionState;

/// A specialized `Result` type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client, either to callers or through `error` events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientError {
    /// The connection could not be opened or a frame could not be sent.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No reply arrived in time.
    #[error("Request `{key}` timed out after {timeout:?}")]
    Timeout {
        /// Correlation key (or `connect`) of the operation
        key: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// The operation is not allowed in the current connection state.
    #[error("Cannot {operation} while {state}")]
    NotReady {
        /// The refused operation
        operation: &'static str,
        /// State at the time of the call
        state: ConnectionState,
    },

    /// A frame could not be parsed, or lacked expected fields.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server sent an `error` frame.
    #[error("Server error: {0}")]
    Server(String),

    /// Automatic reconnection gave up. Terminal until `connect()` is called.
    #[error("Max reconnection attempts reached ({attempts})")]
    MaxReconnectAttemptsExceeded {
        /// Consecutive failed attempts
        attempts: u32,
    },

    /// A request with the same correlation key is still waiting for its reply.
    #[error("A `{key}` request is already in flight")]
    RequestInFlight {
        /// The contested key
        key: CorrelationKey,
    },

    /// The server answered with an explicit failure.
    #[error("Server rejected `{key}`: {reason}")]
    Rejected {
        /// The rejected request
        key: CorrelationKey,
        /// Server-supplied reason
        reason: String,
    },

    /// The client was closed while the request was pending.
    #[error("Client closed")]
    ClientClosed,

    /// Topic names must not be empty.
    #[error("Topic must not be empty")]
    InvalidTopic,

    /// The topic feeds the notification center and cannot be re-routed.
    #[error("Topic `{0}` is managed by the notification center")]
    ReservedTopic(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn unexpected_reply(key: &CorrelationKey, reply: &ServerMessage) -> Self {
        Self::Protocol(ProtocolError::InvalidFrame {
            kind: reply.kind().to_string(),
            reason: format!("unexpected reply to `{key}`"),
        })
    }

    /// `true` for errors that only concern the caller's request, not the connection.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::NotReady { .. }
                | Self::RequestInFlight { .. }
                | Self::Rejected { .. }
                | Self::InvalidTopic
                | Self::ReservedTopic(_)
        )
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ClientError::NotReady {
            operation: "publish",
            state: ConnectionState::OpenUnregistered,
        };
        assert_eq!(err.to_string(), "Cannot publish while open (unregistered)");

        let err = ClientError::RequestInFlight {
            key: CorrelationKey::Subscribe("t".into()),
        };
        assert_eq!(err.to_string(), "A `subscribe:t` request is already in flight");

        assert_eq!(
            ClientError::MaxReconnectAttemptsExceeded { attempts: 10 }.to_string(),
            "Max reconnection attempts reached (10)"
        );
    }

    #[test]
    fn test_from_lower_layers() {
        let err: ClientError = TransportError::NotConnected.into();
        assert!(matches!(err, ClientError::Transport(TransportError::NotConnected)));
        let err: ClientError = ProtocolError::MissingType.into();
        assert!(!err.is_request_error());
        assert!(ClientError::InvalidTopic.is_request_error());
        assert!(ClientError::ReservedTopic("broadcast:driver".into()).is_request_error());
    }
}
