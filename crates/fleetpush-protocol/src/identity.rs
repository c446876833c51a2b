//! Client identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// The role a user plays in the delivery network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// A driver carrying deliveries.
    Driver,
    /// A customer placing orders.
    Client,
    /// A warehouse operator.
    Warehouse,
}

impl UserType {
    /// All roles, in wire order.
    pub const ALL: [Self; 3] = [Self::Driver, Self::Client, Self::Warehouse];

    /// The lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Client => "client",
            Self::Warehouse => "warehouse",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driver" => Ok(Self::Driver),
            "client" => Ok(Self::Client),
            "warehouse" => Ok(Self::Warehouse),
            _ => Err(ProtocolError::UnknownVariant {
                what: "user type",
                value: s.to_string(),
            }),
        }
    }
}

/// Who this client is. Fixed for the lifetime of a client instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Opaque user identifier, usually an e-mail address.
    pub user_id: String,
    /// The user's role.
    pub user_type: UserType,
}

impl Identity {
    /// Creates an identity.
    pub fn new(user_id: impl Into<String>, user_type: UserType) -> Self {
        Self {
            user_id: user_id.into(),
            user_type,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.user_id, self.user_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_parse_is_case_insensitive() {
        assert_eq!("Driver".parse::<UserType>().unwrap(), UserType::Driver);
        assert_eq!(" warehouse ".parse::<UserType>().unwrap(), UserType::Warehouse);
        assert!("admin".parse::<UserType>().is_err());
    }

    #[test]
    fn test_user_type_serde_lowercase() {
        let json = serde_json::to_string(&UserType::Warehouse).unwrap();
        assert_eq!(json, "\"warehouse\"");
        for role in UserType::ALL {
            assert_eq!(role.to_string().parse::<UserType>().unwrap(), role);
        }
    }

    #[test]
    fn test_identity_display() {
        let id = Identity::new("a@x.com", UserType::Client);
        assert_eq!(id.to_string(), "a@x.com (client)");
    }
}
