//! Pending request table.
//!
//! The protocol has no request ids, so each in-flight request is keyed by its
//! [`CorrelationKey`] and at most one request per key may be live. Entries are
//! inserted before the frame is sent and removed on reply, timeout, close, or
//! when the waiting future is dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use fleetpush_protocol::{CorrelationKey, ServerMessage};

use crate::error::{ClientError, ClientResult};
use crate::registry::TopicCallback;

pub(crate) type Completion = oneshot::Sender<ClientResult<ServerMessage>>;
pub(crate) type CompletionReceiver = oneshot::Receiver<ClientResult<ServerMessage>>;

/// A request waiting for its reply
pub(crate) struct PendingRequest {
    pub(crate) id: u64,
    pub(crate) created_at: Instant,
    pub(crate) deadline: Instant,
    completion: Completion,
    /// Installed into the registry when a `subscribed` reply resolves this entry.
    pub(crate) on_subscribed: Option<TopicCallback>,
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("deadline", &self.deadline)
            .field("has_callback", &self.on_subscribed.is_some())
            .finish()
    }
}

impl PendingRequest {
    /// Returns `false` if the caller already went away.
    pub(crate) fn complete(self, result: ClientResult<ServerMessage>) -> bool {
        self.completion.send(result).is_ok()
    }

    pub(crate) fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[derive(Debug, Default)]
pub(crate) struct Correlator {
    entries: HashMap<CorrelationKey, PendingRequest>,
    next_id: u64,
}

impl Correlator {
    /// Insert a pending entry, refusing if the key is already live.
    pub(crate) fn register(
        &mut self,
        key: CorrelationKey,
        timeout: Duration,
        on_subscribed: Option<TopicCallback>,
    ) -> ClientResult<(u64, CompletionReceiver)> {
        if let Some(existing) = self.entries.get(&key)
            && !existing.completion.is_closed()
        {
            return Err(ClientError::RequestInFlight { key });
        }

        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        self.entries.insert(
            key,
            PendingRequest {
                id,
                created_at: now,
                deadline: now + timeout,
                completion: tx,
                on_subscribed,
            },
        );
        Ok((id, rx))
    }

    /// Remove and return the entry for `key`, if any.
    pub(crate) fn resolve(&mut self, key: &CorrelationKey) -> Option<PendingRequest> {
        self.entries.remove(key)
    }

    /// Remove the entry only if it is still the one created with `id`.
    pub(crate) fn discard(&mut self, key: &CorrelationKey, id: u64) -> bool {
        if self.entries.get(key).is_some_and(|entry| entry.id == id) {
            self.entries.remove(key);
            true
        } else {
            false
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sorted keys of live entries.
    pub(crate) fn keys(&self) -> Vec<CorrelationKey> {
        let mut keys: Vec<_> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Fail every entry with `error`. Returns how many callers were still waiting.
    pub(crate) fn reject_all(&mut self, error: &ClientError) -> usize {
        self.entries
            .drain()
            .map(|(_, entry)| entry.complete(Err(error.clone())))
            .filter(|waiting| *waiting)
            .count()
    }

    /// Drop the callback a pending subscribe would install. The request itself
    /// stays live. Returns whether a callback was removed.
    pub(crate) fn take_callback(&mut self, key: &CorrelationKey) -> bool {
        self.entries
            .get_mut(key)
            .and_then(|entry| entry.on_subscribed.take())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_resolve_completes_caller() {
        let mut correlator = Correlator::default();
        let key = CorrelationKey::Status;
        let (_, rx) = correlator.register(key.clone(), TIMEOUT, None).unwrap();
        assert_eq!(correlator.keys(), vec![key.clone()]);

        let entry = correlator.resolve(&key).unwrap();
        assert!(entry.complete(Ok(ServerMessage::Pong)));
        assert_eq!(rx.await.unwrap(), Ok(ServerMessage::Pong));
        assert_eq!(correlator.len(), 0);
    }

    #[test]
    fn test_duplicate_live_key_is_rejected() {
        let mut correlator = Correlator::default();
        let key = CorrelationKey::Publish("t".into());
        let (_first, _rx) = correlator.register(key.clone(), TIMEOUT, None).unwrap();
        let err = correlator.register(key.clone(), TIMEOUT, None).unwrap_err();
        assert_eq!(err, ClientError::RequestInFlight { key });
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn test_abandoned_entry_can_be_replaced() {
        let mut correlator = Correlator::default();
        let key = CorrelationKey::Users;
        let (first, rx) = correlator.register(key.clone(), TIMEOUT, None).unwrap();
        drop(rx);
        let (second, _rx) = correlator.register(key.clone(), TIMEOUT, None).unwrap();
        assert_ne!(first, second);
        // A stale guard must not remove the replacement.
        assert!(!correlator.discard(&key, first));
        assert!(correlator.discard(&key, second));
        assert_eq!(correlator.len(), 0);
    }

    #[tokio::test]
    async fn test_reject_all() {
        let mut correlator = Correlator::default();
        let (_, a) = correlator.register(CorrelationKey::Status, TIMEOUT, None).unwrap();
        let (_, b) = correlator.register(CorrelationKey::Users, TIMEOUT, None).unwrap();
        drop(b);

        assert_eq!(correlator.reject_all(&ClientError::ClientClosed), 1);
        assert_eq!(a.await.unwrap(), Err(ClientError::ClientClosed));
        assert_eq!(correlator.len(), 0);
    }

    #[test]
    fn test_take_callback_keeps_request_live() {
        let mut correlator = Correlator::default();
        let key = CorrelationKey::Subscribe("t".into());
        let callback: TopicCallback = std::sync::Arc::new(|_| {});
        let (_, _rx) = correlator
            .register(key.clone(), TIMEOUT, Some(callback))
            .unwrap();

        assert!(correlator.take_callback(&key));
        assert!(!correlator.take_callback(&key));
        assert!(!correlator.take_callback(&CorrelationKey::Subscribe("other".into())));

        let entry = correlator.resolve(&key).unwrap();
        assert!(entry.on_subscribed.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let mut correlator = Correlator::default();
        let key = CorrelationKey::Register;
        let (_, _rx) = correlator.register(key.clone(), TIMEOUT, None).unwrap();
        tokio::time::advance(TIMEOUT).await;
        let entry = correlator.resolve(&key).unwrap();
        assert!(entry.is_expired());
        assert_eq!(entry.deadline - entry.created_at, TIMEOUT);
        assert_eq!(correlator.keys(), Vec::<CorrelationKey>::new());
    }
}
