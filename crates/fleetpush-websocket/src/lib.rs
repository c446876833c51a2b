//! # Fleetpush WebSocket Transport
//!
//! [`Transport`](fleetpush_transport_traits::Transport) implementation over a
//! client WebSocket connection, built on `tokio-tungstenite`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fleetpush_websocket::{WebSocketConfig, WebSocketTransport};
//! use fleetpush_transport_traits::Transport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = WebSocketTransport::new(WebSocketConfig::client("ws://localhost:3008"))?;
//! let mut events = transport.take_events().expect("fresh transport");
//! transport.open().await?;
//! transport.send(r#"{"type":"ping"}"#.to_string()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! fleetpush-websocket/
//! ├── config.rs        # Configuration and validation
//! ├── types.rs         # Transport struct, type aliases, per-connection closer
//! ├── connection.rs    # open / send / close
//! ├── tasks.rs         # Background reader task
//! └── transport.rs     # Transport trait implementation
//! ```
//!
//! Each `open()` produces a fresh connection with its own id and reader task.
//! Whichever side ends the connection first, exactly one
//! [`TransportEvent::Closed`](fleetpush_transport_traits::TransportEvent::Closed)
//! is emitted for it.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod config;
mod connection;
mod tasks;
mod transport;
mod types;

pub use config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE, WebSocketConfig};
pub use types::{WebSocketStreamType, WebSocketTransport, WebSocketWriter};
