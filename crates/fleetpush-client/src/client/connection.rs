//! Connection lifecycle: connect, close, automatic reconnection and heartbeat.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use fleetpush_protocol::ClientMessage;
use fleetpush_transport_traits::TransportError;

use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::state::{ConnectionState, ReconnectDecision};

use super::core::{ClientInner, PubSubClient, Shared};

impl PubSubClient {
    /// Open the transport and wait until registration completes.
    ///
    /// Also re-arms automatic reconnection after `close()` or after the retry
    /// budget ran out. Calling it while already connecting or connected just
    /// waits for registration.
    ///
    /// # Errors
    ///
    /// [`ClientError::Transport`] if the transport cannot be opened or the
    /// connection drops before registering, [`ClientError::Timeout`] if
    /// registration does not complete within `connect_wait_timeout`.
    pub async fn connect(&self) -> ClientResult<()> {
        let inner = &self.inner;
        let should_open = {
            let mut shared = inner.shared.lock();
            shared.manual_close = false;
            match shared.state {
                ConnectionState::Disconnected => {
                    if let Some(timer) = shared.reconnect_timer.take() {
                        timer.abort();
                    }
                    inner.set_state(&mut shared, ConnectionState::Connecting);
                    true
                }
                ConnectionState::Connecting
                | ConnectionState::OpenUnregistered
                | ConnectionState::Registered => false,
                ConnectionState::Closing => {
                    return Err(ClientError::NotReady {
                        operation: "connect",
                        state: ConnectionState::Closing,
                    });
                }
            }
        };

        if should_open {
            info!(
                user_id = %inner.identity.user_id,
                endpoint = %inner.transport.endpoint(),
                "Connecting to pub/sub server"
            );
            if let Err(e) = inner.transport.open().await {
                inner.connection_lost(Some(e.to_string()));
                return Err(e.into());
            }
        }

        inner.wait_until_registered().await
    }

    /// Close the connection and stop all timers.
    ///
    /// Every pending request fails with [`ClientError::ClientClosed`]. No
    /// reconnect or heartbeat fires afterwards until `connect()` is called.
    /// Local subscriptions are kept.
    pub async fn close(&self) {
        let inner = &self.inner;
        let rejected = {
            let mut shared = inner.shared.lock();
            shared.manual_close = true;
            if let Some(timer) = shared.reconnect_timer.take() {
                timer.abort();
            }
            if shared.state != ConnectionState::Disconnected {
                inner.set_state(&mut shared, ConnectionState::Closing);
            }
            shared.pending.reject_all(&ClientError::ClientClosed)
        };
        if rejected > 0 {
            debug!(rejected, "Rejected pending requests on close");
        }

        if let Err(e) = inner.transport.close().await {
            warn!("Transport close failed: {}", e);
        }
        inner.connection_lost(Some("closed by client".to_string()));
        info!(user_id = %inner.identity.user_id, "Client closed");
    }

    /// Same as [`close`](Self::close).
    pub async fn disconnect(&self) {
        self.close().await;
    }
}

impl ClientInner {
    /// Common path for every way a connection ends (or fails to start).
    pub(super) fn connection_lost(&self, reason: Option<String>) {
        let (previous, decision, max_attempts) = {
            let mut shared = self.shared.lock();
            shared.connection_id = None;
            let previous = shared.state;
            self.set_state(&mut shared, ConnectionState::Disconnected);

            let decision = if shared.manual_close {
                None
            } else {
                let decision = shared.reconnect.record_abnormal_close();
                if let ReconnectDecision::Retry { delay, .. } = decision {
                    self.schedule_reconnect(&mut shared, delay);
                }
                Some(decision)
            };
            (previous, decision, shared.reconnect.max_attempts())
        };

        if previous != ConnectionState::Disconnected {
            info!(
                user_id = %self.identity.user_id,
                reason = reason.as_deref().unwrap_or("unknown"),
                "Disconnected from pub/sub server"
            );
            self.events.emit(&ClientEvent::Disconnect {
                user_id: self.identity.user_id.clone(),
                reason,
            });
        }

        match decision {
            Some(ReconnectDecision::Retry { attempt, delay }) => {
                info!("Reconnect attempt {}/{} scheduled in {:?}", attempt, max_attempts, delay);
            }
            Some(ReconnectDecision::Exhausted { attempts }) => {
                error!(
                    user_id = %self.identity.user_id,
                    attempts,
                    "Max reconnection attempts reached, giving up"
                );
                self.events.emit(&ClientEvent::Error(
                    ClientError::MaxReconnectAttemptsExceeded { attempts },
                ));
            }
            Some(ReconnectDecision::AlreadyExhausted) => {
                debug!("Reconnect budget exhausted, waiting for connect()");
            }
            None => {}
        }
    }

    fn schedule_reconnect(&self, shared: &mut Shared, delay: Duration) {
        let weak = self.weak.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.reconnect_now().await;
            }
        });
        // The previous timer may be the task running this call; let it finish.
        shared.reconnect_timer = Some(timer);
    }

    async fn reconnect_now(&self) {
        {
            let mut shared = self.shared.lock();
            if shared.manual_close || shared.state != ConnectionState::Disconnected {
                debug!(state = %shared.state, "Skipping reconnect");
                return;
            }
            self.set_state(&mut shared, ConnectionState::Connecting);
        }
        info!(user_id = %self.identity.user_id, "Reconnecting to pub/sub server");
        if let Err(e) = self.transport.open().await {
            self.connection_lost(Some(e.to_string()));
        }
    }

    /// Register in the background after the transport opened.
    pub(super) fn spawn_registration(&self) {
        let weak = self.weak.clone();
        tokio::spawn(async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let client = inner.client();
            match client.register().await {
                Ok(()) => {
                    if client.inner.config.resubscribe_on_reconnect {
                        client.inner.resubscribe().await;
                    }
                }
                Err(ClientError::ClientClosed) => {}
                Err(e) => {
                    warn!("Registration failed: {}", e);
                    client.inner.events.emit(&ClientEvent::Error(e));
                }
            }
        });
    }

    /// Re-issue `subscribe` for every topic in the registry.
    async fn resubscribe(&self) {
        let entries = self.shared.lock().subscriptions.entries();
        if entries.is_empty() {
            return;
        }
        debug!(count = entries.len(), "Restoring subscriptions");
        for (topic, callback) in entries {
            if let Err(e) = self.subscribe_with(&topic, callback).await {
                warn!(topic = %topic, "Failed to restore subscription: {}", e);
                self.events.emit(&ClientEvent::Error(e));
            }
        }
    }

    /// Resolve once registered, fail if the connection drops first.
    async fn wait_until_registered(&self) -> ClientResult<()> {
        let mut rx = self.state_tx.subscribe();
        let wait = async {
            loop {
                let state = *rx.borrow_and_update();
                match state {
                    ConnectionState::Registered => return Ok(()),
                    ConnectionState::Disconnected | ConnectionState::Closing => {
                        return Err(ClientError::Transport(TransportError::ConnectionLost(
                            format!("connection {state} before registration"),
                        )));
                    }
                    ConnectionState::Connecting | ConnectionState::OpenUnregistered => {}
                }
                if rx.changed().await.is_err() {
                    return Err(ClientError::ClientClosed);
                }
            }
        };

        let timeout = self.config.connect_wait_timeout;
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "Registration did not complete in time");
                Err(ClientError::Timeout {
                    key: "connect".to_string(),
                    timeout,
                })
            }
        }
    }

    pub(super) fn start_heartbeat(&self, shared: &mut Shared) {
        let period = self.config.heartbeat_interval;
        if shared.heartbeat.is_some() || period.is_zero() {
            return;
        }

        let weak = self.weak.clone();
        let user_id = self.identity.user_id.clone();
        shared.heartbeat = Some(tokio::spawn(async move {
            debug!("Heartbeat task started for {} every {:?}", user_id, period);
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.state().is_open() {
                    break;
                }
                if !inner.transport.is_open().await {
                    trace!("Transport not open, skipping heartbeat");
                    continue;
                }
                match ClientMessage::Ping.to_frame() {
                    Ok(frame) => {
                        if inner.transport.send(frame).await.is_ok() {
                            trace!("Heartbeat ping sent for {}", user_id);
                        }
                    }
                    Err(e) => warn!("Failed to encode heartbeat: {}", e),
                }
            }
            debug!("Heartbeat task gracefully terminated for {}", user_id);
        }));
    }
}
