//! Connection state machine and reconnection bookkeeping.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use fleetpush_protocol::UserType;

/// Where the client is in its connection lifecycle.
///
/// ```text
/// Disconnected --connect()--> Connecting --open--> OpenUnregistered --registered--> Registered
///      ^                          |                      |                              |
///      +------- close / error ----+----------------------+------------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection.
    Disconnected,
    /// Waiting for the transport to open.
    Connecting,
    /// Transport open, registration pending.
    OpenUnregistered,
    /// Registered with the server; topic operations allowed.
    Registered,
    /// `close()` in progress.
    Closing,
}

impl ConnectionState {
    /// Transport is open (registered or not).
    pub const fn is_open(self) -> bool {
        matches!(self, Self::OpenUnregistered | Self::Registered)
    }

    /// Registration completed.
    pub const fn is_registered(self) -> bool {
        matches!(self, Self::Registered)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::OpenUnregistered => write!(f, "open (unregistered)"),
            Self::Registered => write!(f, "registered"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// What to do after an abnormal close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Try again after `delay`.
    Retry {
        /// Attempt number, starting at 1
        attempt: u32,
        /// Fixed delay before the attempt
        delay: Duration,
    },
    /// The budget just ran out. Reported once.
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
    /// The budget ran out earlier; nothing more to report.
    AlreadyExhausted,
}

/// Bounded, fixed-interval retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    attempts: u32,
    max_attempts: u32,
    interval: Duration,
}

impl ReconnectState {
    /// A fresh budget.
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            interval,
        }
    }

    /// Consecutive abnormal closes since the last successful open.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Budget size.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// No automatic retry is left.
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Called on every successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Called on every abnormal close.
    pub fn record_abnormal_close(&mut self) -> ReconnectDecision {
        if self.is_exhausted() {
            return ReconnectDecision::AlreadyExhausted;
        }
        self.attempts += 1;
        if self.attempts < self.max_attempts {
            ReconnectDecision::Retry {
                attempt: self.attempts,
                delay: self.interval,
            }
        } else {
            ReconnectDecision::Exhausted {
                attempts: self.attempts,
            }
        }
    }
}

/// Point-in-time view of the client, for diagnostics and UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Transport open.
    pub is_connected: bool,
    /// Registration completed.
    pub is_registered: bool,
    /// Own user id.
    pub user_id: String,
    /// Own role.
    pub user_type: UserType,
    /// Topics with a local callback, sorted.
    pub subscriptions: Vec<String>,
    /// Consecutive failed reconnects.
    pub reconnect_attempts: u32,
    /// Exact state.
    pub state: ConnectionState,
}
