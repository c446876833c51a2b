//! Core transport trait.

use std::future::Future;
use std::pin::Pin;

use crate::error::TransportResult;
use crate::events::TransportEventReceiver;
use crate::metrics::TransportMetrics;
use crate::types::{TransportState, TransportType};

/// The trait every fleetpush transport implements.
///
/// A transport owns at most one physical connection at a time. Inbound frames,
/// opens, closes and errors are reported through the event channel returned
/// by [`take_events`](Transport::take_events), never through return values.
///
/// Contract:
/// - `open` emits `Opened` on success. On failure it emits `Error`, discards
///   the connection and returns the error.
/// - `send` on a transport that is not open drops the frame, emits `Error`
///   and returns it. It never panics.
/// - `close` always succeeds and causes exactly one `Closed` event per opened
///   connection, however often it is called and whichever side closed first.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Returns the type of this transport.
    fn transport_type(&self) -> TransportType;

    /// Returns the endpoint address this transport connects to.
    fn endpoint(&self) -> String;

    /// Returns the current state of the transport.
    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>>;

    /// Establishes a connection to the remote endpoint.
    fn open(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Sends a single text frame.
    fn send(&self, frame: String) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Closes the current connection, if any.
    fn close(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Hands out the event receiver. Returns `None` after the first call.
    fn take_events(&self) -> Option<TransportEventReceiver>;

    /// Returns a snapshot of the transport's counters.
    fn metrics(&self) -> TransportMetrics {
        TransportMetrics::default()
    }

    /// Returns `true` if the transport is currently in the `Connected` state.
    fn is_open(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.state().await.is_open() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the trait can be used as a trait object
    fn _test_transport_object(_t: &dyn Transport) {}
}
