//! Connection management for the WebSocket transport
//!
//! Opening, sending on and closing a connection.

use std::sync::atomic::Ordering;

use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use fleetpush_transport_traits::{
    TransportError, TransportResult, TransportState, validate_frame_size,
};

use crate::types::{ActiveConnection, ConnectionCloser, WebSocketTransport};

impl WebSocketTransport {
    /// Connect to the configured URL and start the reader task
    pub(crate) async fn open_connection(&self) -> TransportResult<()> {
        let _open = self.open_lock.lock().await;

        let already_open = self
            .active
            .lock()
            .as_ref()
            .is_some_and(|active| !active.closer.is_closed());
        if already_open {
            debug!("open() on an open transport for session {}", self.session_id);
            return Ok(());
        }

        *self.state.write().await = TransportState::Connecting;
        info!("Connecting to {} for session {}", self.config.url, self.session_id);

        let timeout = self.config.connect_timeout;
        let stream = match tokio::time::timeout(timeout, connect_async(self.config.url.as_str())).await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(self.fail_open(TransportError::ConnectionFailed(e.to_string())).await),
            Err(_) => {
                return Err(self
                    .fail_open(TransportError::ConnectionTimeout {
                        operation: "open".to_string(),
                        timeout,
                    })
                    .await);
            }
        };

        let (sink, reader) = stream.split();
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1;
        let closer = ConnectionCloser::new(id, self);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        {
            let mut writer = self.writer.lock().await;
            *writer = Some(sink);
            *self.state.write().await = TransportState::Connected;
        }
        self.metrics.record_connect(true);
        self.emitter.emit_opened(id, self.config.url.clone());

        let reader_task = self.spawn_reader_task(reader, closer.clone(), shutdown_rx);
        *self.active.lock() = Some(ActiveConnection {
            closer,
            shutdown_tx,
            reader_task,
        });

        info!(
            "WebSocket connection {} established for session {}",
            id, self.session_id
        );
        Ok(())
    }

    async fn fail_open(&self, error: TransportError) -> TransportError {
        warn!(
            "Failed to connect to {} for session {}: {}",
            self.config.url, self.session_id, error
        );
        self.metrics.record_connect(false);
        *self.state.write().await = TransportState::Failed {
            reason: error.to_string(),
        };
        self.emitter
            .emit_error(error.clone(), Some(format!("open {}", self.config.url)));
        error
    }

    /// Send one text frame on the current connection
    pub(crate) async fn send_frame(&self, frame: String) -> TransportResult<()> {
        let size = frame.len();
        if let Err(e) = validate_frame_size(size, self.config.max_message_size) {
            self.emitter.emit_error(e.clone(), Some("send".to_string()));
            return Err(e);
        }

        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            drop(writer);
            trace!("Dropping frame, no connection for session {}", self.session_id);
            self.emitter
                .emit_error(TransportError::NotConnected, Some("send".to_string()));
            return Err(TransportError::NotConnected);
        };

        match sink.send(Message::text(frame)).await {
            Ok(()) => {
                self.metrics.record_sent(size);
                trace!("Sent {} byte frame in session {}", size, self.session_id);
                Ok(())
            }
            Err(e) => {
                drop(writer);
                let error = TransportError::SendFailed(e.to_string());
                warn!("Send failed in session {}: {}", self.session_id, error);
                self.emitter.emit_error(error.clone(), Some("send".to_string()));
                Err(error)
            }
        }
    }

    /// Close the current connection, if any
    pub(crate) async fn close_connection(&self) -> TransportResult<()> {
        let Some(active) = self.active.lock().take() else {
            trace!("close() with no connection for session {}", self.session_id);
            return Ok(());
        };

        if !active.closer.is_closed() {
            active.closer.mark_local();
            *self.state.write().await = TransportState::Disconnecting;
            if let Some(sink) = self.writer.lock().await.as_mut()
                && let Err(e) = sink.send(Message::Close(None)).await
            {
                debug!("Close frame not delivered for session {}: {}", self.session_id, e);
            }
        }

        let _ = active.shutdown_tx.send(());
        active.closer.finish(None).await;
        active.reader_task.abort();
        Ok(())
    }
}
