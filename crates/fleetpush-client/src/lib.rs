//! # Fleetpush Client
//!
//! Real-time push-notification client for the fleet logistics platform.
//!
//! One long-lived connection carries registration, topic publish/subscribe,
//! and server queries. The wire protocol has no request ids, so replies are
//! correlated by type and topic. The client reconnects automatically with a
//! bounded, fixed-interval schedule and pings the server while registered.
//!
//! ## Features
//!
//! - **Request correlation** - at most one in-flight request per key, with timeouts
//! - **Topic subscriptions** - one callback per topic, restored after reconnect
//! - **Lifecycle events** - `connect`, `disconnect`, `error` and raw `message` listeners
//! - **Notification center** - feed of notifications from the personal and role topics
//! - **Panic isolation** - a panicking callback never breaks dispatch
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fleetpush_client::{ClientConfig, NotificationCenter};
//! use fleetpush_protocol::{Identity, NotificationKind, UserType};
//!
//! # async fn example() -> fleetpush_client::ClientResult<()> {
//! let center = NotificationCenter::builder(Identity::new("a@x.com", UserType::Client))
//!     .config(ClientConfig::default().with_server_url("ws://localhost:3008"))
//!     .on_notification(|n| println!("{}: {}", n.title, n.message))
//!     .max_notifications(50)
//!     .start()
//!     .await?;
//!
//! center
//!     .broadcast_notification(UserType::Driver, "Shift", "New shift posted", NotificationKind::Info, None)
//!     .await?;
//! println!("{} notifications", center.notifications().len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! fleetpush-client/
//! ├── client/          # PubSubClient: dispatcher, connection lifecycle, operations
//! ├── notifications/   # NotificationCenter, feed, host platform trait
//! ├── config.rs        # ClientConfig and file/env loading
//! ├── correlator.rs    # Pending request table
//! ├── registry.rs      # Topic callbacks
//! ├── events.rs        # Event bus and callback isolation
//! ├── state.rs         # Connection state machine, reconnect budget
//! └── testing.rs       # MockTransport / MockBroker (feature `test-util`)
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod client;
mod config;
mod correlator;
mod error;
mod events;
mod notifications;
mod registry;
mod state;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::PubSubClient;
pub use config::{ClientConfig, DEFAULT_SERVER_URL, ENV_PREFIX};
pub use error::{ClientError, ClientResult};
pub use events::{ClientEvent, EventKind, EventListener, ListenerId};
pub use notifications::{
    HeadlessPlatform, NotificationCallback, NotificationCenter, NotificationCenterBuilder,
    NotificationFeed, NotificationPlatform, Permission,
};
pub use registry::TopicCallback;
pub use state::{ConnectionState, ConnectionStatus, ReconnectDecision, ReconnectState};

pub use fleetpush_protocol as protocol;
pub use fleetpush_transport_traits as transport;

/// Common imports for applications
pub mod prelude {
    pub use crate::{
        ClientConfig, ClientError, ClientEvent, ClientResult, ConnectionState, EventKind,
        NotificationCenter, Permission, PubSubClient,
    };
    pub use fleetpush_protocol::{
        Identity, Notification, NotificationKind, TopicMessage, UserType, topics,
    };
}
