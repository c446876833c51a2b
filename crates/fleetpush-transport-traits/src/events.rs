//! Transport event types.

use tokio::sync::mpsc;

use crate::error::TransportError;

/// Identifies one physical connection of a transport.
///
/// Ids increase monotonically per transport, so a consumer can tell events of
/// a stale connection from those of the current one.
pub type ConnectionId = u64;

/// Receiving half of a transport's event channel.
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Represents events that occur within a transport's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A connection has been established and is usable.
    Opened {
        /// The new connection.
        connection_id: ConnectionId,
        /// The endpoint of the connection.
        endpoint: String,
    },

    /// A text frame arrived.
    Frame {
        /// The connection it arrived on.
        connection_id: ConnectionId,
        /// The raw frame text.
        payload: String,
    },

    /// A connection has ended. Emitted exactly once per opened connection.
    Closed {
        /// The connection that ended.
        connection_id: ConnectionId,
        /// An optional reason for the close.
        reason: Option<String>,
        /// `true` if `close()` was called locally.
        initiated_locally: bool,
    },

    /// An error has occurred in the transport.
    Error {
        /// The error that occurred.
        error: TransportError,
        /// Optional additional context about the error.
        context: Option<String>,
    },
}

/// An emitter for delivering `TransportEvent`s to the transport's consumer.
///
/// The channel is unbounded: frames and close notifications must never be
/// dropped, and the consumer drains it continuously.
#[derive(Debug, Clone)]
pub struct TransportEventEmitter {
    sender: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEventEmitter {
    /// Creates a new event emitter and a corresponding receiver.
    #[must_use]
    pub fn new() -> (Self, TransportEventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Emits an event. Events emitted after the receiver is gone are discarded.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.sender.send(event);
    }

    /// Emits an `Opened` event.
    pub fn emit_opened(&self, connection_id: ConnectionId, endpoint: String) {
        self.emit(TransportEvent::Opened {
            connection_id,
            endpoint,
        });
    }

    /// Emits a `Frame` event.
    pub fn emit_frame(&self, connection_id: ConnectionId, payload: String) {
        self.emit(TransportEvent::Frame {
            connection_id,
            payload,
        });
    }

    /// Emits a `Closed` event.
    pub fn emit_closed(
        &self,
        connection_id: ConnectionId,
        reason: Option<String>,
        initiated_locally: bool,
    ) {
        self.emit(TransportEvent::Closed {
            connection_id,
            reason,
            initiated_locally,
        });
    }

    /// Emits an `Error` event.
    pub fn emit_error(&self, error: TransportError, context: Option<String>) {
        self.emit(TransportEvent::Error { error, context });
    }

    /// Returns `true` once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl Default for TransportEventEmitter {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_event_emitter() {
        let (emitter, mut receiver) = TransportEventEmitter::new();

        emitter.emit_opened(1, "ws://localhost:3008".to_string());
        emitter.emit_frame(1, r#"{"type":"pong"}"#.to_string());
        emitter.emit_closed(1, Some("bye".to_string()), true);

        match receiver.recv().await.unwrap() {
            TransportEvent::Opened {
                connection_id,
                endpoint,
            } => {
                assert_eq!(connection_id, 1);
                assert_eq!(endpoint, "ws://localhost:3008");
            }
            other => panic!("Unexpected event variant: {other:?}"),
        }
        assert!(matches!(
            receiver.recv().await.unwrap(),
            TransportEvent::Frame { .. }
        ));
        assert_eq!(
            receiver.recv().await.unwrap(),
            TransportEvent::Closed {
                connection_id: 1,
                reason: Some("bye".to_string()),
                initiated_locally: true,
            }
        );
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped_is_silent() {
        let (emitter, receiver) = TransportEventEmitter::new();
        drop(receiver);
        assert!(emitter.is_closed());
        emitter.emit_error(TransportError::NotConnected, None);
    }
}
