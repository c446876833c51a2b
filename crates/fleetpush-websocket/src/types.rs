//! Core types and type aliases for the WebSocket transport

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use tracing::info;

use fleetpush_transport_traits::{
    AtomicMetrics, ConnectionId, TransportEventEmitter, TransportEventReceiver, TransportResult,
    TransportState,
};

use crate::config::WebSocketConfig;

/// Type alias for the client WebSocket stream
pub type WebSocketStreamType = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Type alias for the shared WebSocket writer half
pub type WebSocketWriter = Arc<Mutex<Option<SplitSink<WebSocketStreamType, Message>>>>;

/// Reader half, owned by the connection's reader task
pub(crate) type WebSocketReader = SplitStream<WebSocketStreamType>;

/// WebSocket implementation of [`Transport`](fleetpush_transport_traits::Transport)
pub struct WebSocketTransport {
    /// Transport configuration
    pub(crate) config: WebSocketConfig,

    /// Current state
    pub(crate) state: Arc<RwLock<TransportState>>,

    /// Writer half of the current connection
    pub(crate) writer: WebSocketWriter,

    /// Event sink
    pub(crate) emitter: TransportEventEmitter,

    /// Event receiver until the consumer takes it
    pub(crate) events: parking_lot::Mutex<Option<TransportEventReceiver>>,

    /// The connection opened last, until `close()` takes it
    pub(crate) active: parking_lot::Mutex<Option<ActiveConnection>>,

    /// Serialises concurrent `open()` calls
    pub(crate) open_lock: Mutex<()>,

    /// Last connection id handed out
    pub(crate) next_connection_id: AtomicU64,

    /// Counters
    pub(crate) metrics: Arc<AtomicMetrics>,

    /// Identifier used in log lines
    pub(crate) session_id: String,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.config.url)
            .field("session_id", &self.session_id)
            .field(
                "active_connection",
                &self.active.lock().as_ref().map(|a| a.closer.id),
            )
            .finish()
    }
}

impl WebSocketTransport {
    /// Creates a transport for `config`. No connection is made until `open()`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: WebSocketConfig) -> TransportResult<Self> {
        config.validate()?;
        let (emitter, events) = TransportEventEmitter::new();
        Ok(Self {
            config,
            state: Arc::new(RwLock::new(TransportState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            emitter,
            events: parking_lot::Mutex::new(Some(events)),
            active: parking_lot::Mutex::new(None),
            open_lock: Mutex::new(()),
            next_connection_id: AtomicU64::new(0),
            metrics: Arc::new(AtomicMetrics::new()),
            session_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// The configuration this transport was built with.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Session identifier used in log output.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            let _ = active.shutdown_tx.send(());
            active.reader_task.abort();
        }
    }
}

/// Bookkeeping for one open connection.
pub(crate) struct ActiveConnection {
    pub(crate) closer: ConnectionCloser,
    pub(crate) shutdown_tx: broadcast::Sender<()>,
    pub(crate) reader_task: JoinHandle<()>,
}

/// Finishes one connection exactly once, from whichever side ends it first.
#[derive(Clone)]
pub(crate) struct ConnectionCloser {
    pub(crate) id: ConnectionId,
    closed: Arc<AtomicBool>,
    closing_locally: Arc<AtomicBool>,
    state: Arc<RwLock<TransportState>>,
    writer: WebSocketWriter,
    emitter: TransportEventEmitter,
    metrics: Arc<AtomicMetrics>,
    session_id: String,
}

impl ConnectionCloser {
    pub(crate) fn new(id: ConnectionId, transport: &WebSocketTransport) -> Self {
        Self {
            id,
            closed: Arc::new(AtomicBool::new(false)),
            closing_locally: Arc::new(AtomicBool::new(false)),
            state: transport.state.clone(),
            writer: transport.writer.clone(),
            emitter: transport.emitter.clone(),
            metrics: transport.metrics.clone(),
            session_id: transport.session_id.clone(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_local(&self) {
        self.closing_locally.store(true, Ordering::Release);
    }

    /// Tears the connection down and emits `Closed`. Later calls are no-ops.
    ///
    /// The writer lock is held throughout, so a concurrent `open()` cannot
    /// install its writer until this connection is fully finished.
    pub(crate) async fn finish(&self, reason: Option<String>) {
        let mut writer = self.writer.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        *writer = None;
        *self.state.write().await = TransportState::Disconnected;
        self.metrics.record_disconnect();

        let initiated_locally = self.closing_locally.load(Ordering::Acquire);
        let reason = if initiated_locally {
            Some("closed by client".to_string())
        } else {
            reason
        };
        info!(
            "WebSocket connection {} closed for session {} (local: {}, reason: {:?})",
            self.id, self.session_id, initiated_locally, reason
        );
        self.emitter.emit_closed(self.id, reason, initiated_locally);
    }
}
