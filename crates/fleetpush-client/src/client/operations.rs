//! Request/response operations.
//!
//! Every operation goes through [`ClientInner::round_trip`]: check the state,
//! insert the pending entry, send, then wait for the correlated reply or the
//! timeout. Nothing is sent when the state check or the insert fails.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use fleetpush_protocol::{
    ClientMessage, CorrelationKey, PUBLISH_SUCCESS_MESSAGE, RegisteredUser, ServerMessage,
    TopicMessage,
};

use crate::error::{ClientError, ClientResult};
use crate::registry::TopicCallback;
use crate::state::ConnectionState;

use super::core::{ClientInner, PubSubClient};

/// Rejection reason for a `published` reply without a status message.
const MISSING_CONFIRMATION: &str = "missing publish confirmation";

/// Minimum state an operation needs.
#[derive(Debug, Clone, Copy)]
enum Requirement {
    /// Transport open, registered or not
    Open,
    /// Registration completed
    Registered,
}

impl Requirement {
    fn check(self, operation: &'static str, state: ConnectionState) -> ClientResult<()> {
        let ok = match self {
            Self::Open => state.is_open(),
            Self::Registered => state.is_registered(),
        };
        if ok {
            Ok(())
        } else {
            Err(ClientError::NotReady { operation, state })
        }
    }
}

/// Removes the pending entry when the waiting future finishes or is dropped.
struct PendingGuard<'a> {
    inner: &'a ClientInner,
    key: &'a CorrelationKey,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.inner.shared.lock().pending.discard(self.key, self.id) {
            trace!(key = %self.key, "Pending request discarded");
        }
    }
}

fn validate_topic(topic: &str) -> ClientResult<&str> {
    if topic.is_empty() {
        Err(ClientError::InvalidTopic)
    } else {
        Ok(topic)
    }
}

impl PubSubClient {
    /// Register this identity with the server.
    ///
    /// Runs automatically after every open; exposed for manual re-registration.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotReady`] if the transport is not open, or closes before
    /// the reply is handled. [`ClientError::Timeout`] if the server does not
    /// answer within the register timeout.
    pub async fn register(&self) -> ClientResult<()> {
        let inner = &self.inner;
        let key = CorrelationKey::Register;
        let reply = inner
            .round_trip(
                key.clone(),
                ClientMessage::register(&inner.identity),
                Requirement::Open,
                inner.config.register_timeout,
                None,
            )
            .await?;
        if !matches!(reply, ServerMessage::Registered { .. }) {
            return Err(ClientError::unexpected_reply(&key, &reply));
        }

        {
            let mut shared = inner.shared.lock();
            if !shared.state.is_open() {
                return Err(ClientError::NotReady {
                    operation: "register",
                    state: shared.state,
                });
            }
            inner.set_state(&mut shared, ConnectionState::Registered);
            inner.start_heartbeat(&mut shared);
        }
        info!(
            user_id = %inner.identity.user_id,
            user_type = %inner.identity.user_type,
            "Registered with pub/sub server"
        );
        Ok(())
    }

    /// Publish `data` to `topic`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Rejected`] if the server answers with anything but the
    /// success message, including a reply that carries no message at all.
    pub async fn publish(&self, topic: &str, data: Value) -> ClientResult<()> {
        let topic = validate_topic(topic)?;
        let inner = &self.inner;
        let key = CorrelationKey::Publish(topic.to_string());
        let reply = inner
            .round_trip(
                key.clone(),
                ClientMessage::publish(&inner.identity, topic, data),
                Requirement::Registered,
                inner.config.request_timeout,
                None,
            )
            .await?;
        match reply {
            ServerMessage::Published { message, .. } => {
                if message.as_deref() == Some(PUBLISH_SUCCESS_MESSAGE) {
                    return Ok(());
                }
                let reason = message.unwrap_or_else(|| MISSING_CONFIRMATION.to_string());
                warn!(%key, %reason, "Publish rejected by server");
                Err(ClientError::Rejected { key, reason })
            }
            other => Err(ClientError::unexpected_reply(&key, &other)),
        }
    }

    /// Subscribe to `topic`; `callback` runs for every later notification on it.
    ///
    /// The callback is installed when the `subscribed` reply is dispatched and
    /// replaces any earlier callback for the topic. An [`unsubscribe`] issued
    /// while the request is in flight cancels the install.
    ///
    /// [`unsubscribe`]: Self::unsubscribe
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidTopic`] for an empty topic, [`ClientError::NotReady`]
    /// before registration, [`ClientError::Timeout`] when no reply arrives.
    pub async fn subscribe<F>(&self, topic: &str, callback: F) -> ClientResult<()>
    where
        F: Fn(TopicMessage) + Send + Sync + 'static,
    {
        self.inner.subscribe_with(topic, Arc::new(callback)).await
    }

    /// Unsubscribe from `topic`.
    ///
    /// The local callback is removed before the request is sent, so delivery
    /// stops even if the round trip fails. A subscribe to the same topic that
    /// is still waiting for its reply will not install its callback.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidTopic`] for an empty topic, [`ClientError::NotReady`]
    /// before registration, [`ClientError::Timeout`] when no reply arrives.
    pub async fn unsubscribe(&self, topic: &str) -> ClientResult<()> {
        let topic = validate_topic(topic)?;
        let inner = &self.inner;
        {
            let mut shared = inner.shared.lock();
            Requirement::Registered.check("unsubscribe", shared.state)?;
            if !shared.subscriptions.remove(topic) {
                debug!(topic, "Unsubscribing from a topic without local callback");
            }
            if shared
                .pending
                .take_callback(&CorrelationKey::Subscribe(topic.to_string()))
            {
                debug!(topic, "Cancelled callback of in-flight subscribe");
            }
        }

        let key = CorrelationKey::Unsubscribe(topic.to_string());
        let reply = inner
            .round_trip(
                key.clone(),
                ClientMessage::unsubscribe(&inner.identity, topic),
                Requirement::Registered,
                inner.config.request_timeout,
                None,
            )
            .await?;
        match reply {
            ServerMessage::Unsubscribed { .. } => Ok(()),
            other => Err(ClientError::unexpected_reply(&key, &other)),
        }
    }

    /// Server statistics, as sent by the server.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotReady`] without an open transport,
    /// [`ClientError::Timeout`] when no reply arrives.
    pub async fn status(&self) -> ClientResult<Value> {
        let key = CorrelationKey::Status;
        match self
            .inner
            .round_trip(
                key.clone(),
                ClientMessage::Status,
                Requirement::Open,
                self.inner.config.request_timeout,
                None,
            )
            .await?
        {
            ServerMessage::Status(stats) => Ok(stats),
            other => Err(ClientError::unexpected_reply(&key, &other)),
        }
    }

    /// Users currently registered with the server.
    ///
    /// # Errors
    ///
    /// Same as [`status`](Self::status).
    pub async fn users(&self) -> ClientResult<Vec<RegisteredUser>> {
        let key = CorrelationKey::Users;
        match self
            .inner
            .round_trip(
                key.clone(),
                ClientMessage::Users,
                Requirement::Open,
                self.inner.config.request_timeout,
                None,
            )
            .await?
        {
            ServerMessage::Users(users) => Ok(users),
            other => Err(ClientError::unexpected_reply(&key, &other)),
        }
    }
}

impl ClientInner {
    pub(super) async fn subscribe_with(
        &self,
        topic: &str,
        callback: TopicCallback,
    ) -> ClientResult<()> {
        let topic = validate_topic(topic)?;
        let key = CorrelationKey::Subscribe(topic.to_string());
        let reply = self
            .round_trip(
                key.clone(),
                ClientMessage::subscribe(&self.identity, topic),
                Requirement::Registered,
                self.config.request_timeout,
                Some(callback),
            )
            .await?;
        match reply {
            ServerMessage::Subscribed { .. } => {
                debug!(topic, "Subscribed");
                Ok(())
            }
            other => Err(ClientError::unexpected_reply(&key, &other)),
        }
    }

    async fn round_trip(
        &self,
        key: CorrelationKey,
        message: ClientMessage,
        requirement: Requirement,
        timeout: Duration,
        on_subscribed: Option<TopicCallback>,
    ) -> ClientResult<ServerMessage> {
        let frame = message.to_frame()?;
        let (id, rx) = {
            let mut shared = self.shared.lock();
            requirement.check(key.operation(), shared.state)?;
            shared.pending.register(key.clone(), timeout, on_subscribed)?
        };
        let _guard = PendingGuard {
            inner: self,
            key: &key,
            id,
        };

        trace!(%key, "Sending request");
        if let Err(e) = self.transport.send(frame).await {
            // The transport already reported it as an error event.
            debug!(%key, error = %e, "Request frame was not sent");
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ClientClosed),
            Err(_) => {
                warn!(%key, ?timeout, "Request timed out");
                Err(ClientError::Timeout {
                    key: key.to_string(),
                    timeout,
                })
            }
        }
    }
}
