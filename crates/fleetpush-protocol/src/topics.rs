//! Well-known topic names.

use crate::identity::UserType;

/// System-wide announcements.
pub const ANNOUNCEMENTS: &str = "announcements";

/// Promotional messages.
pub const PROMOTIONS: &str = "promotions";

/// Order updates for all interested parties.
pub const ORDER_UPDATES: &str = "order-updates";

/// Personal feed of one user: `notifications:<userId>`.
pub fn user_notifications(user_id: &str) -> String {
    format!("notifications:{user_id}")
}

/// Feed for every user of one role: `broadcast:<userType>`.
pub fn broadcast(user_type: UserType) -> String {
    format!("broadcast:{user_type}")
}

/// `order-status:<orderId>`
pub fn order_status(order_id: &str) -> String {
    format!("order-status:{order_id}")
}

/// `delivery-updates:<deliveryId>`
pub fn delivery_updates(delivery_id: &str) -> String {
    format!("delivery-updates:{delivery_id}")
}

/// `driver-location:<driverId>`
pub fn driver_location(driver_id: &str) -> String {
    format!("driver-location:{driver_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_builders() {
        assert_eq!(user_notifications("a@x.com"), "notifications:a@x.com");
        assert_eq!(broadcast(UserType::Driver), "broadcast:driver");
        assert_eq!(order_status("42"), "order-status:42");
        assert_eq!(delivery_updates("d1"), "delivery-updates:d1");
        assert_eq!(driver_location("drv"), "driver-location:drv");
    }
}
