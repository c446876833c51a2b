//! Topic to callback map for server-pushed notifications.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use fleetpush_protocol::TopicMessage;

/// Callback invoked for each notification on a subscribed topic.
pub type TopicCallback = Arc<dyn Fn(TopicMessage) + Send + Sync>;

/// One callback per topic; inserting replaces.
#[derive(Default, Clone)]
pub(crate) struct SubscriptionRegistry {
    callbacks: BTreeMap<String, TopicCallback>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("topics", &self.callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Returns `true` when an earlier callback was replaced.
    pub(crate) fn insert(&mut self, topic: String, callback: TopicCallback) -> bool {
        self.callbacks.insert(topic, callback).is_some()
    }

    pub(crate) fn remove(&mut self, topic: &str) -> bool {
        self.callbacks.remove(topic).is_some()
    }

    pub(crate) fn get(&self, topic: &str) -> Option<TopicCallback> {
        self.callbacks.get(topic).cloned()
    }

    pub(crate) fn contains(&self, topic: &str) -> bool {
        self.callbacks.contains_key(topic)
    }

    /// Sorted topic names.
    pub(crate) fn topics(&self) -> Vec<String> {
        self.callbacks.keys().cloned().collect()
    }

    /// Snapshot used for re-subscription after a reconnect.
    pub(crate) fn entries(&self) -> Vec<(String, TopicCallback)> {
        self.callbacks
            .iter()
            .map(|(topic, cb)| (topic.clone(), cb.clone()))
            .collect()
    }
}
