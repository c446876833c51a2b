//! Transport metrics types.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of a transport's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMetrics {
    /// Total number of bytes sent.
    pub bytes_sent: u64,

    /// Total number of bytes received.
    pub bytes_received: u64,

    /// Total number of frames sent.
    pub frames_sent: u64,

    /// Total number of frames received.
    pub frames_received: u64,

    /// Total number of connection attempts.
    pub connections: u64,

    /// Total number of failed connection attempts.
    pub failed_connections: u64,

    /// Whether a connection is currently open.
    pub active_connections: u64,
}

/// Lock-free counters, updated from the transport's tasks.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    connections: AtomicU64,
    failed_connections: AtomicU64,
    active_connections: AtomicU64,
}

impl AtomicMetrics {
    /// Creates a new `AtomicMetrics` instance with all counters initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outbound frame of `size` bytes.
    pub fn record_sent(&self, size: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Records one inbound frame of `size` bytes.
    pub fn record_received(&self, size: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Records a connection attempt and its outcome.
    pub fn record_connect(&self, succeeded: bool) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.active_connections.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_connections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records the end of an open connection.
    pub fn record_disconnect(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Creates a serializable `TransportMetrics` snapshot from the current atomic values.
    pub fn snapshot(&self) -> TransportMetrics {
        TransportMetrics {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            failed_connections: self.failed_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_metrics_snapshot() {
        let metrics = AtomicMetrics::new();
        metrics.record_connect(false);
        metrics.record_connect(true);
        metrics.record_sent(10);
        metrics.record_received(4);
        metrics.record_received(6);
        metrics.record_disconnect();
        metrics.record_disconnect();

        let snap = metrics.snapshot();
        assert_eq!(snap.connections, 2);
        assert_eq!(snap.failed_connections, 1);
        assert_eq!(snap.active_connections, 0);
        assert_eq!(snap.frames_sent, 1);
        assert_eq!(snap.bytes_sent, 10);
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.bytes_received, 10);
    }
}
