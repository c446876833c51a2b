//! # Fleetpush Transport Traits
//!
//! Core transport traits and types for the fleetpush pub/sub client.
//! Every transport implementation depends on this crate and nothing else from fleetpush.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`Transport`]
//! - **Types**: [`TransportType`], [`TransportState`]
//! - **Events**: [`TransportEvent`], [`TransportEventEmitter`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Metrics**: [`TransportMetrics`], [`AtomicMetrics`]
//!
//! ## Usage
//!
//! A transport owns one physical connection at a time. It reports what happens
//! to that connection through a [`TransportEvent`] channel which the client
//! takes exactly once:
//!
//! ```rust,ignore
//! use fleetpush_transport_traits::{Transport, TransportEvent};
//!
//! let mut events = transport.take_events().expect("events already taken");
//! transport.open().await?;
//! while let Some(event) = events.recv().await {
//!     if let TransportEvent::Frame { payload, .. } = event {
//!         println!("{payload}");
//!     }
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod error;
mod events;
mod metrics;
mod traits;
mod types;

// Re-export all public items
pub use error::{TransportError, TransportResult, validate_frame_size};
pub use events::{ConnectionId, TransportEvent, TransportEventEmitter, TransportEventReceiver};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use traits::Transport;
pub use types::{TransportState, TransportType};
