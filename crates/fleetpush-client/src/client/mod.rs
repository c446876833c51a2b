//! The pub/sub client.
//!
//! ```text
//! client/
//! ├── core.rs          # PubSubClient, shared state, state transitions
//! ├── dispatcher.rs    # Single task consuming transport events
//! ├── connection.rs    # connect / close / reconnect / heartbeat
//! └── operations.rs    # register, publish, subscribe, unsubscribe, status, users
//! ```

mod connection;
mod core;
mod dispatcher;
mod operations;

pub use self::core::PubSubClient;
