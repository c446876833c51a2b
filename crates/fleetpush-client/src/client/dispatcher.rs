//! Message dispatcher
//!
//! One task per client consumes the transport's event stream, so frames are
//! handled strictly in arrival order. Each frame goes to the correlator first,
//! then to the topic registry, then to `message` listeners.

use std::sync::Weak;

use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use fleetpush_protocol::{CorrelationKey, InboundFrame, ServerMessage};
use fleetpush_transport_traits::{ConnectionId, TransportEvent, TransportEventReceiver};

use crate::error::ClientError;
use crate::events::{ClientEvent, call_isolated};
use crate::state::ConnectionState;

use super::core::ClientInner;

pub(super) fn spawn(
    weak: Weak<ClientInner>,
    mut events: TransportEventReceiver,
    user_id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Message dispatcher task started for {}", user_id);
        while let Some(event) = events.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.handle_transport_event(event).await;
        }
        debug!("Message dispatcher task gracefully terminated for {}", user_id);
    })
}

impl ClientInner {
    async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Opened {
                connection_id,
                endpoint,
            } => self.handle_opened(connection_id, &endpoint).await,
            TransportEvent::Frame {
                connection_id,
                payload,
            } => {
                if self.is_current(connection_id) {
                    self.dispatch_frame(&payload);
                } else {
                    debug!(connection_id, "Ignoring frame from stale connection");
                }
            }
            TransportEvent::Closed {
                connection_id,
                reason,
                initiated_locally,
            } => {
                if self.is_current(connection_id) {
                    debug!(connection_id, initiated_locally, "Transport closed");
                    self.connection_lost(reason);
                } else {
                    trace!(connection_id, "Ignoring close of stale connection");
                }
            }
            TransportEvent::Error { error, context } => {
                warn!(error = %error, context = ?context, "Transport error");
                self.events.emit(&ClientEvent::Error(ClientError::Transport(error)));
            }
        }
    }

    fn is_current(&self, connection_id: ConnectionId) -> bool {
        self.shared.lock().connection_id == Some(connection_id)
    }

    async fn handle_opened(&self, connection_id: ConnectionId, endpoint: &str) {
        let accepted = {
            let mut shared = self.shared.lock();
            if shared.manual_close {
                false
            } else {
                shared.connection_id = Some(connection_id);
                shared.reconnect.reset();
                self.set_state(&mut shared, ConnectionState::OpenUnregistered);
                true
            }
        };

        if !accepted {
            debug!(connection_id, "Connection opened after close, shutting it down");
            if let Err(e) = self.transport.close().await {
                warn!("Failed to close late connection: {}", e);
            }
            return;
        }

        info!(
            user_id = %self.identity.user_id,
            endpoint,
            connection_id,
            "Connected to pub/sub server"
        );
        self.events.emit(&ClientEvent::Connect {
            user_id: self.identity.user_id.clone(),
            user_type: self.identity.user_type,
        });
        self.spawn_registration();
    }

    fn dispatch_frame(&self, payload: &str) {
        let frame = match InboundFrame::parse(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.events.emit(&ClientEvent::Error(ClientError::Protocol(e)));
                return;
            }
        };
        trace!(kind = frame.message.kind(), "Frame received");

        let delivery = {
            let mut guard = self.shared.lock();
            let shared = &mut *guard;

            if let Some(key) = frame.message.correlation_key(&self.identity.user_id) {
                match shared.pending.resolve(&key) {
                    Some(entry) => {
                        if let (CorrelationKey::Subscribe(topic), Some(callback)) =
                            (&key, entry.on_subscribed.clone())
                            && shared.subscriptions.insert(topic.clone(), callback)
                        {
                            debug!(topic = %topic, "Replaced subscription callback");
                        }
                        if entry.is_expired() {
                            debug!(%key, "Reply arrived at the deadline");
                        }
                        debug!(%key, elapsed = ?entry.created_at.elapsed(), "Reply correlated");
                        if !entry.complete(Ok(frame.message.clone())) {
                            trace!(%key, "Caller stopped waiting before the reply");
                        }
                    }
                    None => debug!(%key, "No pending request for reply, ignoring"),
                }
            }

            match &frame.message {
                ServerMessage::Notification(message) => shared
                    .subscriptions
                    .get(&message.topic)
                    .map(|callback| (callback, message.clone())),
                _ => None,
            }
        };

        match &frame.message {
            ServerMessage::Notification(message) if delivery.is_none() => {
                trace!(topic = %message.topic, "Notification for topic without callback");
            }
            ServerMessage::Error { message } => {
                warn!(message = %message, "Server reported an error");
                self.events
                    .emit(&ClientEvent::Error(ClientError::Server(message.clone())));
            }
            ServerMessage::Pong => trace!("Heartbeat pong received"),
            ServerMessage::Other { kind } => debug!(kind = %kind, "Unhandled frame type"),
            _ => {}
        }

        if let Some((callback, message)) = delivery {
            let topic = message.topic.clone();
            if !call_isolated("subscription callback", || callback(message)) {
                warn!(topic = %topic, "Subscription callback panicked");
            }
        }

        self.events.emit(&ClientEvent::Message(frame.raw));
    }
}
