//! Background task management for the WebSocket transport
//!
//! One reader task per connection. It is the single consumer of the stream
//! half and turns every WebSocket message into a transport event.

use std::sync::Arc;

use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use fleetpush_transport_traits::{
    AtomicMetrics, ConnectionId, TransportError, TransportEventEmitter, validate_frame_size,
};

use crate::types::{ConnectionCloser, WebSocketReader, WebSocketTransport};

struct FrameSink {
    connection_id: ConnectionId,
    emitter: TransportEventEmitter,
    metrics: Arc<AtomicMetrics>,
    max_message_size: Option<usize>,
    session_id: String,
}

impl FrameSink {
    fn deliver(&self, text: String) {
        let size = text.len();
        if let Err(e) = validate_frame_size(size, self.max_message_size) {
            warn!("Dropping oversized frame in session {}: {}", self.session_id, e);
            self.emitter.emit_error(e, Some("receive".to_string()));
            return;
        }
        self.metrics.record_received(size);
        trace!("Received {} byte frame in session {}", size, self.session_id);
        self.emitter.emit_frame(self.connection_id, text);
    }
}

impl WebSocketTransport {
    /// Spawn the reader task for one connection
    ///
    /// The task ends on a shutdown signal from `close()`, or when the stream
    /// ends. In the second case it finishes the connection itself.
    pub(crate) fn spawn_reader_task(
        &self,
        mut reader: WebSocketReader,
        closer: ConnectionCloser,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let writer = self.writer.clone();
        let sink = FrameSink {
            connection_id: closer.id,
            emitter: self.emitter.clone(),
            metrics: self.metrics.clone(),
            max_message_size: self.config.max_message_size,
            session_id: self.session_id.clone(),
        };

        tokio::spawn(async move {
            let session_id = sink.session_id.clone();
            debug!(
                "Message reader task started for session {} (connection {})",
                session_id, sink.connection_id
            );

            let remote_end = loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Message reader received shutdown signal for session {}", session_id);
                        break None;
                    }

                    msg = reader.next() => match msg {
                        Some(Ok(Message::Text(text))) => sink.deliver(text.as_str().to_owned()),
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                            Ok(text) => sink.deliver(text),
                            Err(e) => {
                                warn!("Non UTF-8 binary frame in session {}", session_id);
                                sink.emitter.emit_error(
                                    TransportError::ProtocolError(format!("binary frame is not UTF-8: {e}")),
                                    Some("receive".to_string()),
                                );
                            }
                        },
                        Some(Ok(Message::Ping(data))) => {
                            if let Some(ref mut w) = *writer.lock().await
                                && w.send(Message::Pong(data)).await.is_ok()
                            {
                                trace!("Message reader sent pong in session {}", session_id);
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            trace!("Message reader received pong in session {}", session_id);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("WebSocket closed by peer in session {}", session_id);
                            let reason = frame
                                .map(|f| f.reason.as_str().to_owned())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "closed by server".to_string());
                            break Some(reason);
                        }
                        Some(Ok(Message::Frame(_))) => {
                            trace!("Message reader received raw frame in session {}", session_id);
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error in session {}: {}", session_id, e);
                            sink.emitter.emit_error(
                                TransportError::ReceiveFailed(e.to_string()),
                                Some("receive".to_string()),
                            );
                            break Some(e.to_string());
                        }
                        None => {
                            info!("WebSocket stream ended for session {}", session_id);
                            break Some("stream ended".to_string());
                        }
                    }
                }
            };

            if let Some(reason) = remote_end {
                closer.finish(Some(reason)).await;
            }

            debug!(
                "Message reader task gracefully terminated for session {}",
                session_id
            );
        })
    }
}
