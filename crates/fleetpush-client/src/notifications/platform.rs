//! Host notification capability.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use fleetpush_protocol::Notification;

/// Whether the host lets us show notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Notifications may be displayed
    Granted,
    /// The user refused
    Denied,
    /// Not asked yet
    NotDetermined,
}

/// Native notification support provided by the host application.
pub trait NotificationPlatform: Send + Sync + fmt::Debug {
    /// Whether the host can display notifications at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Current permission.
    fn permission(&self) -> Permission;

    /// Ask the user, resolving to the resulting permission.
    fn request_permission(&self) -> Pin<Box<dyn Future<Output = Permission> + Send + '_>>;

    /// Show `notification` natively.
    fn display(&self, notification: &Notification);
}

/// Default platform for hosts without native notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPlatform;

impl NotificationPlatform for HeadlessPlatform {
    fn is_supported(&self) -> bool {
        false
    }

    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&self) -> Pin<Box<dyn Future<Output = Permission> + Send + '_>> {
        Box::pin(async { Permission::Denied })
    }

    fn display(&self, _notification: &Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_headless_is_denied() {
        let platform = HeadlessPlatform;
        assert!(!platform.is_supported());
        assert_eq!(platform.permission(), Permission::Denied);
        assert_eq!(platform.request_permission().await, Permission::Denied);
    }
}
