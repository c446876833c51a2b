//! Protocol error types.

use thiserror::Error;

/// A specialized `Result` type for frame encoding and decoding.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The frame was not valid JSON.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The frame was JSON but not an object with a string `type` field.
    #[error("Frame has no `type` discriminator")]
    MissingType,

    /// A known frame type lacked a field it requires.
    #[error("Invalid `{kind}` frame: {reason}")]
    InvalidFrame {
        /// The `type` of the offending frame
        kind: String,
        /// What was wrong with it
        reason: String,
    },

    /// An outbound message could not be serialized.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// A textual value did not name a known variant.
    #[error("Unknown {what}: {value}")]
    UnknownVariant {
        /// The kind of value being parsed (e.g. `user type`)
        what: &'static str,
        /// The rejected input
        value: String,
    },
}

impl ProtocolError {
    pub(crate) fn invalid(kind: &str, err: &serde_json::Error) -> Self {
        Self::InvalidFrame {
            kind: kind.to_string(),
            reason: err.to_string(),
        }
    }
}
