//! Bounded in-memory notification history.
//!
//! Newest entries sit at the front; pushing past the cap drops from the back.

use std::collections::VecDeque;

use fleetpush_protocol::Notification;

/// Most-recent-first list of received notifications, optionally capped.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    items: VecDeque<Notification>,
    capacity: Option<usize>,
}

impl NotificationFeed {
    /// A feed keeping at most `capacity` entries, or unbounded for `None`.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Prepend, dropping the oldest entries beyond the cap.
    pub fn push(&mut self, notification: Notification) {
        self.items.push_front(notification);
        if let Some(capacity) = self.capacity {
            self.items.truncate(capacity);
        }
    }

    /// Remove by id. Returns `false` if there was no such entry.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.items.iter().position(|n| n.id == id) {
            Some(index) => self.items.remove(index).is_some(),
            None => false,
        }
    }

    /// Remove everything, returning how many entries there were.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    /// Newest entry.
    pub fn latest(&self) -> Option<&Notification> {
        self.items.front()
    }

    /// Entries, newest first.
    pub fn to_vec(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
