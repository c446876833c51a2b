//! Outbound and inbound frame types.
//!
//! Outbound frames are a plain internally-tagged serde enum. Inbound frames are
//! decoded in two steps: the `type` discriminator is read first, then the
//! matching body is decoded. Unknown types are kept as [`ServerMessage::Other`]
//! so that generic listeners still see them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::correlation::CorrelationKey;
use crate::error::{ProtocolError, ProtocolResult};
use crate::identity::{Identity, UserType};

/// The `message` a `published` reply carries on success.
pub const PUBLISH_SUCCESS_MESSAGE: &str = "Message published successfully";

/// A frame sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Announce this client's identity.
    #[serde(rename_all = "camelCase")]
    Register {
        /// Registering user
        user_id: String,
        /// Registering user's role
        user_type: UserType,
    },
    /// Publish `data` to every subscriber of `topic`.
    #[serde(rename_all = "camelCase")]
    Publish {
        /// Publishing user
        user_id: String,
        /// Target topic
        topic: String,
        /// Arbitrary payload
        data: Value,
    },
    /// Start receiving `notification` frames for `topic`.
    #[serde(rename_all = "camelCase")]
    Subscribe {
        /// Subscribing user
        user_id: String,
        /// Topic to subscribe to
        topic: String,
    },
    /// Stop receiving `notification` frames for `topic`.
    #[serde(rename_all = "camelCase")]
    Unsubscribe {
        /// Unsubscribing user
        user_id: String,
        /// Topic to leave
        topic: String,
    },
    /// Ask for server statistics.
    Status,
    /// Ask for the list of registered users.
    Users,
    /// Keep-alive.
    Ping,
}

impl ClientMessage {
    /// `register` frame for `identity`.
    pub fn register(identity: &Identity) -> Self {
        Self::Register {
            user_id: identity.user_id.clone(),
            user_type: identity.user_type,
        }
    }

    /// `publish` frame.
    pub fn publish(identity: &Identity, topic: impl Into<String>, data: Value) -> Self {
        Self::Publish {
            user_id: identity.user_id.clone(),
            topic: topic.into(),
            data,
        }
    }

    /// `subscribe` frame.
    pub fn subscribe(identity: &Identity, topic: impl Into<String>) -> Self {
        Self::Subscribe {
            user_id: identity.user_id.clone(),
            topic: topic.into(),
        }
    }

    /// `unsubscribe` frame.
    pub fn unsubscribe(identity: &Identity, topic: impl Into<String>) -> Self {
        Self::Unsubscribe {
            user_id: identity.user_id.clone(),
            topic: topic.into(),
        }
    }

    /// The wire `type` of this frame.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Publish { .. } => "publish",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Status => "status",
            Self::Users => "users",
            Self::Ping => "ping",
        }
    }

    /// The key a reply to this frame will be correlated under.
    ///
    /// `ping` expects no reply and has no key.
    pub fn correlation_key(&self) -> Option<CorrelationKey> {
        match self {
            Self::Register { .. } => Some(CorrelationKey::Register),
            Self::Publish { topic, .. } => Some(CorrelationKey::Publish(topic.clone())),
            Self::Subscribe { topic, .. } => Some(CorrelationKey::Subscribe(topic.clone())),
            Self::Unsubscribe { topic, .. } => Some(CorrelationKey::Unsubscribe(topic.clone())),
            Self::Status => Some(CorrelationKey::Status),
            Self::Users => Some(CorrelationKey::Users),
            Self::Ping => None,
        }
    }

    /// Encodes the frame as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be serialized.
    pub fn to_frame(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::SerializationFailed(e.to_string()))
    }
}

/// Payload of a `notification` frame, and the value handed to topic callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Publishing user, if the server reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Publishing user's role, as reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_type: Option<String>,
    /// Whatever the publisher sent as `data`.
    #[serde(default)]
    pub message: Value,
    /// Server-side timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

/// One entry of a `users` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    /// User identifier.
    pub user_id: String,
    /// Role as reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    /// Any further server-defined fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ServerMessage {
    /// Registration acknowledged.
    Registered {
        /// The user the server registered
        user_id: String,
    },
    /// Publish acknowledged, possibly with a failure message.
    Published {
        /// Topic the publish went to
        topic: String,
        /// Server status text
        message: Option<String>,
    },
    /// Subscription acknowledged.
    Subscribed {
        /// Subscribed topic
        topic: String,
    },
    /// Unsubscription acknowledged.
    Unsubscribed {
        /// Topic left
        topic: String,
    },
    /// Server statistics. The whole frame, shape defined by the server.
    Status(Value),
    /// Registered users.
    Users(Vec<RegisteredUser>),
    /// A message published on a subscribed topic.
    Notification(TopicMessage),
    /// Heartbeat reply.
    Pong,
    /// Server-reported failure.
    Error {
        /// Error text
        message: String,
    },
    /// A frame type this client does not know.
    Other {
        /// The unrecognised `type`
        kind: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredBody {
    user_id: String,
}

#[derive(Deserialize)]
struct TopicBody {
    topic: String,
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Deserialize)]
struct UsersBody {
    users: Vec<RegisteredUser>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl ServerMessage {
    /// The wire `type` of this frame.
    pub fn kind(&self) -> &str {
        match self {
            Self::Registered { .. } => "registered",
            Self::Published { .. } => "published",
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribed { .. } => "unsubscribed",
            Self::Status(_) => "status",
            Self::Users(_) => "users",
            Self::Notification(_) => "notification",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
            Self::Other { kind } => kind,
        }
    }

    /// The key of the pending request this frame answers, if any.
    ///
    /// A `registered` frame only answers this client's registration when it
    /// names `own_user_id`.
    pub fn correlation_key(&self, own_user_id: &str) -> Option<CorrelationKey> {
        match self {
            Self::Registered { user_id } if user_id == own_user_id => {
                Some(CorrelationKey::Register)
            }
            Self::Published { topic, .. } => Some(CorrelationKey::Publish(topic.clone())),
            Self::Subscribed { topic } => Some(CorrelationKey::Subscribe(topic.clone())),
            Self::Unsubscribed { topic } => Some(CorrelationKey::Unsubscribe(topic.clone())),
            Self::Status(_) => Some(CorrelationKey::Status),
            Self::Users(_) => Some(CorrelationKey::Users),
            _ => None,
        }
    }

    fn from_value(kind: &str, value: &Value) -> ProtocolResult<Self> {
        fn body<T: for<'de> Deserialize<'de>>(kind: &str, value: &Value) -> ProtocolResult<T> {
            T::deserialize(value).map_err(|e| ProtocolError::invalid(kind, &e))
        }

        let message = match kind {
            "registered" => {
                let RegisteredBody { user_id } = body(kind, value)?;
                Self::Registered { user_id }
            }
            "published" => {
                let TopicBody { topic, message } = body(kind, value)?;
                Self::Published {
                    topic,
                    message: message.and_then(|m| m.as_str().map(str::to_string)),
                }
            }
            "subscribed" => Self::Subscribed {
                topic: body::<TopicBody>(kind, value)?.topic,
            },
            "unsubscribed" => Self::Unsubscribed {
                topic: body::<TopicBody>(kind, value)?.topic,
            },
            "status" => Self::Status(value.clone()),
            "users" => Self::Users(body::<UsersBody>(kind, value)?.users),
            "notification" => Self::Notification(body(kind, value)?),
            "pong" => Self::Pong,
            "error" => Self::Error {
                message: body::<ErrorBody>(kind, value)?
                    .message
                    .unwrap_or_else(|| "unknown server error".to_string()),
            },
            other => Self::Other {
                kind: other.to_string(),
            },
        };
        Ok(message)
    }
}

/// A parsed inbound frame, keeping the raw JSON for generic listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    /// The frame as received.
    pub raw: Value,
    /// The typed view of it.
    pub message: ServerMessage,
}

impl InboundFrame {
    /// Parses one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the text is not JSON, has no string `type`,
    /// or a known type lacks required fields.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let raw: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        let message = ServerMessage::from_value(kind, &raw)?;
        Ok(Self { raw, message })
    }
}
