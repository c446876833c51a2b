//! Notification model.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ProtocolError, ProtocolResult};
use crate::identity::{Identity, UserType};
use crate::message::TopicMessage;

/// Severity of a notification, used by hosts for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Something completed.
    Success,
    /// Something failed.
    Error,
    /// Needs attention.
    Warning,
    /// Neutral information.
    #[default]
    Info,
}

impl NotificationKind {
    /// The lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            _ => Err(ProtocolError::UnknownVariant {
                what: "notification kind",
                value: s.to_string(),
            }),
        }
    }
}

/// A notification in the feed. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Client-generated opaque id.
    pub id: String,
    /// Heading.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    /// Application data attached by the publisher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl Notification {
    /// Builds a feed entry from a delivered topic message.
    ///
    /// The published payload is either a bare string, used as the body, or a
    /// [`NotificationPayload`]-shaped object. Missing titles fall back to
    /// `default_title`. A missing body falls back to `data.message`.
    pub fn from_topic_message(msg: &TopicMessage, default_title: &str) -> Self {
        let mut title = None;
        let mut kind = None;
        let mut data = None;

        let message = match &msg.message {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            Value::Object(payload) => {
                title = non_empty_str(payload.get("title")).map(str::to_string);
                kind = payload
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(|k| k.parse().ok());
                data = payload.get("data").and_then(Value::as_object).cloned();
                non_empty_str(payload.get("message"))
                    .or_else(|| non_empty_str(data.as_ref().and_then(|d| d.get("message"))))
                    .unwrap_or_default()
                    .to_string()
            }
            other => other.to_string(),
        };

        Self {
            id: Uuid::new_v4().simple().to_string(),
            title: title.unwrap_or_else(|| default_title.to_string()),
            message,
            kind: kind.unwrap_or_default(),
            timestamp: Utc::now().timestamp_millis(),
            data,
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Body published by `send_notification`/`broadcast_notification`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Heading.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Application data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    /// Sender id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Sender role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_type: Option<UserType>,
    /// Send time, epoch milliseconds.
    pub timestamp: i64,
}

impl NotificationPayload {
    /// Creates a payload stamped with the current time.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
        data: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            data,
            from: None,
            from_type: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Marks `identity` as the sender.
    pub fn from_identity(mut self, identity: &Identity) -> Self {
        self.from = Some(identity.user_id.clone());
        self.from_type = Some(identity.user_type);
        self
    }

    /// The payload as a JSON value, ready to publish.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        serde_json::to_value(self).map_err(|e| ProtocolError::SerializationFailed(e.to_string()))
    }
}
