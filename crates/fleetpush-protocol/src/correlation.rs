//! Correlation keys.

use std::fmt;

/// Identifies the in-flight request a reply belongs to.
///
/// The wire protocol carries no request ids, so a reply is matched on its
/// `type` and, for topic operations, its topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CorrelationKey {
    /// `register`
    Register,
    /// `publish:<topic>`
    Publish(String),
    /// `subscribe:<topic>`
    Subscribe(String),
    /// `unsubscribe:<topic>`
    Unsubscribe(String),
    /// `status`
    Status,
    /// `users`
    Users,
}

impl CorrelationKey {
    /// The operation name without the topic.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Publish(_) => "publish",
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::Status => "status",
            Self::Users => "users",
        }
    }

    /// The topic, for topic operations.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::Publish(t) | Self::Subscribe(t) | Self::Unsubscribe(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.topic() {
            Some(topic) => write!(f, "{}:{}", self.operation(), topic),
            None => f.write_str(self.operation()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(CorrelationKey::Register.to_string(), "register");
        assert_eq!(CorrelationKey::Publish("t".into()).to_string(), "publish:t");
        assert_eq!(
            CorrelationKey::Unsubscribe("broadcast:driver".into()).to_string(),
            "unsubscribe:broadcast:driver"
        );
        assert_eq!(CorrelationKey::Users.to_string(), "users");
    }
}
