//! Transport trait implementation for WebSocket

use std::future::Future;
use std::pin::Pin;

use fleetpush_transport_traits::{
    Transport, TransportEventReceiver, TransportMetrics, TransportResult, TransportState,
    TransportType,
};

use crate::types::WebSocketTransport;

impl Transport for WebSocketTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }

    fn endpoint(&self) -> String {
        self.config.url.clone()
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.read().await.clone() })
    }

    fn open(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(self.open_connection())
    }

    fn send(&self, frame: String) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(self.send_frame(frame))
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(self.close_connection())
    }

    fn take_events(&self) -> Option<TransportEventReceiver> {
        self.events.lock().take()
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}
