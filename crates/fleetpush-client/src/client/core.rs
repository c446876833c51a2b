//! Core client implementation
//!
//! [`PubSubClient`] is a cheap handle around `Arc<ClientInner>`. All mutable
//! state lives in one `parking_lot::Mutex<Shared>`, which is never held across
//! an `.await` or while user callbacks run.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use fleetpush_protocol::{CorrelationKey, Identity};
use fleetpush_transport_traits::{ConnectionId, Transport, TransportError};
use fleetpush_websocket::WebSocketTransport;

use crate::config::ClientConfig;
use crate::correlator::Correlator;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, EventBus, EventKind, ListenerId};
use crate::registry::SubscriptionRegistry;
use crate::state::{ConnectionState, ConnectionStatus, ReconnectState};

use super::dispatcher;

/// Real-time pub/sub client over a single transport connection.
///
/// Cloning is cheap; all clones drive the same connection. Background tasks
/// stop when the last clone is dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use fleetpush_client::{ClientConfig, PubSubClient};
/// use fleetpush_protocol::{Identity, UserType, topics};
///
/// # async fn example() -> fleetpush_client::ClientResult<()> {
/// let identity = Identity::new("driver-7", UserType::Driver);
/// let client = PubSubClient::websocket(identity, ClientConfig::default().with_auto_connect(false))?;
/// client.connect().await?;
/// client
///     .subscribe(&topics::broadcast(UserType::Driver), |msg| println!("{}", msg.message))
///     .await?;
/// client.publish("order-updates", serde_json::json!({"orderId": 42})).await?;
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PubSubClient {
    pub(super) inner: Arc<ClientInner>,
}

pub(super) struct ClientInner {
    pub(super) weak: Weak<ClientInner>,
    pub(super) identity: Identity,
    pub(super) config: ClientConfig,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) shared: Mutex<Shared>,
    pub(super) events: EventBus,
    pub(super) state_tx: watch::Sender<ConnectionState>,
    pub(super) dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// Everything guarded by the client lock.
pub(super) struct Shared {
    pub(super) state: ConnectionState,
    pub(super) reconnect: ReconnectState,
    pub(super) pending: Correlator,
    pub(super) subscriptions: SubscriptionRegistry,
    /// Connection whose events are current; events for others are stale.
    pub(super) connection_id: Option<ConnectionId>,
    /// Set by `close()`, cleared by `connect()`. Suppresses reconnects.
    pub(super) manual_close: bool,
    pub(super) heartbeat: Option<JoinHandle<()>>,
    pub(super) reconnect_timer: Option<JoinHandle<()>>,
}

impl PubSubClient {
    /// Create a client over `transport`.
    ///
    /// Spawns the dispatcher task, and a connect task when
    /// `config.auto_connect` is set. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ClientError::Config`] if `config` fails validation, and
    /// [`ClientError::Transport`] if another client already owns `transport`.
    pub fn new(
        identity: Identity,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let events = transport.take_events().ok_or_else(|| {
            ClientError::Transport(TransportError::ConfigurationError(
                "transport events were already taken by another client".to_string(),
            ))
        })?;

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let reconnect =
            ReconnectState::new(config.max_reconnect_attempts, config.reconnect_interval);
        let auto_connect = config.auto_connect;

        let inner = Arc::new_cyclic(|weak| ClientInner {
            weak: weak.clone(),
            identity,
            config,
            transport,
            shared: Mutex::new(Shared {
                state: ConnectionState::Disconnected,
                reconnect,
                pending: Correlator::default(),
                subscriptions: SubscriptionRegistry::default(),
                connection_id: None,
                manual_close: false,
                heartbeat: None,
                reconnect_timer: None,
            }),
            events: EventBus::default(),
            state_tx,
            dispatcher: Mutex::new(None),
        });

        let handle = dispatcher::spawn(Arc::downgrade(&inner), events, inner.identity.user_id.clone());
        *inner.dispatcher.lock() = Some(handle);

        let client = Self { inner };
        if auto_connect {
            let background = client.clone();
            tokio::spawn(async move {
                if let Err(e) = background.connect().await {
                    debug!("Automatic connect did not complete: {}", e);
                }
            });
        }
        Ok(client)
    }

    /// Create a client over a WebSocket connection to `config.server_url`.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus [`ClientError::Transport`] when the URL or
    /// frame limit is rejected by the WebSocket transport.
    pub fn websocket(identity: Identity, config: ClientConfig) -> ClientResult<Self> {
        let transport = WebSocketTransport::new(config.websocket_config())?;
        Self::new(identity, config, Arc::new(transport))
    }

    /// This client's identity.
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Transport open (registered or not).
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Registration completed.
    pub fn is_registered(&self) -> bool {
        self.state().is_registered()
    }

    /// Topics with a local callback, sorted.
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.shared.lock().subscriptions.topics()
    }

    /// Whether `topic` has a local callback.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.inner.shared.lock().subscriptions.contains(topic)
    }

    /// Keys of requests still waiting for a reply, sorted.
    pub fn pending_requests(&self) -> Vec<CorrelationKey> {
        self.inner.shared.lock().pending.keys()
    }

    /// Consecutive abnormal closes since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().reconnect.attempts()
    }

    /// Snapshot of the client's status.
    pub fn connection_status(&self) -> ConnectionStatus {
        let shared = self.inner.shared.lock();
        ConnectionStatus {
            is_connected: shared.state.is_open(),
            is_registered: shared.state.is_registered(),
            user_id: self.inner.identity.user_id.clone(),
            user_type: self.inner.identity.user_type,
            subscriptions: shared.subscriptions.topics(),
            reconnect_attempts: shared.reconnect.attempts(),
            state: shared.state,
        }
    }

    /// Register an event listener. Listeners run in registration order.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, Arc::new(listener))
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.events.off(kind, id)
    }
}

impl fmt::Debug for PubSubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("PubSubClient")
            .field("identity", &self.inner.identity)
            .field("endpoint", &self.inner.transport.endpoint())
            .field("state", &shared.state)
            .field("pending", &shared.pending.len())
            .field("subscriptions", &shared.subscriptions)
            .finish()
    }
}

impl ClientInner {
    pub(super) fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// The only place the state changes. Leaving the open states stops the heartbeat.
    pub(super) fn set_state(&self, shared: &mut Shared, next: ConnectionState) {
        if shared.state != next {
            debug!(
                user_id = %self.identity.user_id,
                from = %shared.state,
                to = %next,
                "Connection state changed"
            );
            shared.state = next;
            self.state_tx.send_replace(next);
        }
        if !next.is_open()
            && let Some(heartbeat) = shared.heartbeat.take()
        {
            heartbeat.abort();
        }
    }

    pub(super) fn client(self: Arc<Self>) -> PubSubClient {
        PubSubClient { inner: self }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        debug!(
            "Last client reference dropped for {}, stopping background tasks",
            self.identity.user_id
        );
        if let Some(handle) = self.dispatcher.get_mut().take() {
            handle.abort();
        }
        let shared = self.shared.get_mut();
        for handle in [shared.heartbeat.take(), shared.reconnect_timer.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
        shared.pending.reject_all(&ClientError::ClientClosed);
    }
}
