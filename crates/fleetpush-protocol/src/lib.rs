//! # Fleetpush Protocol
//!
//! Wire-level types shared by every fleetpush crate.
//!
//! ## Overview
//!
//! - **Identity**: [`Identity`], [`UserType`]
//! - **Outbound frames**: [`ClientMessage`]
//! - **Inbound frames**: [`ServerMessage`], [`InboundFrame`], [`TopicMessage`]
//! - **Correlation**: [`CorrelationKey`]
//! - **Notification model**: [`Notification`], [`NotificationKind`], [`NotificationPayload`]
//! - **Topic conventions**: the [`topics`] module
//!
//! Every frame on the wire is a JSON object with a `type` discriminator:
//!
//! ```rust
//! use fleetpush_protocol::{ClientMessage, Identity, UserType};
//!
//! let identity = Identity::new("a@x.com", UserType::Client);
//! let frame = ClientMessage::register(&identity).to_frame().unwrap();
//! assert_eq!(frame, r#"{"type":"register","userId":"a@x.com","userType":"client"}"#);
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

mod correlation;
mod error;
mod identity;
mod message;
mod notification;
pub mod topics;

pub use correlation::CorrelationKey;
pub use error::{ProtocolError, ProtocolResult};
pub use identity::{Identity, UserType};
pub use message::{
    ClientMessage, InboundFrame, PUBLISH_SUCCESS_MESSAGE, RegisteredUser, ServerMessage,
    TopicMessage,
};
pub use notification::{Notification, NotificationKind, NotificationPayload};
