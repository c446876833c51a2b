//! Notification center: the feed-keeping facade used by applications.

mod center;
mod feed;
mod platform;

pub use center::{NotificationCallback, NotificationCenter, NotificationCenterBuilder};
pub use feed::NotificationFeed;
pub use platform::{HeadlessPlatform, NotificationPlatform, Permission};
