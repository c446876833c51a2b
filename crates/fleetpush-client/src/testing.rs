//! In-memory transport and broker for tests.
//!
//! [`MockTransport`] implements [`Transport`] without any I/O. It records every
//! frame sent and can answer like a pub/sub server. [`MockBroker`] connects
//! several mock transports so publishes fan out to subscribers.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Value, json};

use fleetpush_protocol::PUBLISH_SUCCESS_MESSAGE;
use fleetpush_transport_traits::{
    ConnectionId, Transport, TransportError, TransportEventEmitter, TransportEventReceiver,
    TransportResult, TransportState, TransportType,
};

/// How the mock answers requests.
#[derive(Debug, Clone)]
enum ServerMode {
    /// Never replies
    Silent,
    /// Acknowledges every request like a single-client server
    Acknowledging,
    /// Routes through a shared broker
    Broker(MockBroker),
}

#[derive(Debug, Default)]
struct MockState {
    transport_state: TransportState,
    connection: Option<ConnectionId>,
    next_connection_id: ConnectionId,
    sent: Vec<Value>,
    opens: usize,
    refuse_connections: bool,
    failing_opens: usize,
    muted: HashSet<String>,
}

/// In-memory [`Transport`].
pub struct MockTransport {
    weak: Weak<MockTransport>,
    emitter: TransportEventEmitter,
    events: Mutex<Option<TransportEventReceiver>>,
    state: Mutex<MockState>,
    mode: ServerMode,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockTransport")
            .field("mode", &self.mode)
            .field("state", &state.transport_state)
            .field("connection", &state.connection)
            .field("sent", &state.sent.len())
            .finish()
    }
}

impl MockTransport {
    fn with_mode(mode: ServerMode) -> Arc<Self> {
        let (emitter, events) = TransportEventEmitter::new();
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            emitter,
            events: Mutex::new(Some(events)),
            state: Mutex::new(MockState::default()),
            mode,
        })
    }

    /// A server that never answers.
    pub fn silent() -> Arc<Self> {
        Self::with_mode(ServerMode::Silent)
    }

    /// A server that acknowledges every request.
    pub fn acknowledging() -> Arc<Self> {
        Self::with_mode(ServerMode::Acknowledging)
    }

    /// Stop answering requests of wire type `kind`.
    pub fn mute(&self, kind: &str) {
        self.state.lock().muted.insert(kind.to_string());
    }

    /// Answer requests of wire type `kind` again.
    pub fn unmute(&self, kind: &str) {
        self.state.lock().muted.remove(kind);
    }

    /// Make every `open()` fail until called with `false`.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connections = refuse;
    }

    /// Make the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().failing_opens = count;
    }

    /// Deliver a raw text frame as if the server sent it.
    pub fn push(&self, frame: impl Into<String>) {
        let connection = self.state.lock().connection;
        if let Some(id) = connection {
            self.emitter.emit_frame(id, frame.into());
        }
    }

    /// Deliver a JSON frame as if the server sent it.
    pub fn push_json(&self, frame: Value) {
        self.push(frame.to_string());
    }

    /// Close the current connection from the server side.
    pub fn close_from_server(&self, reason: &str) {
        let connection = {
            let mut state = self.state.lock();
            state.transport_state = TransportState::Disconnected;
            state.connection.take()
        };
        if let Some(id) = connection {
            self.forget_in_broker();
            self.emitter.emit_closed(id, Some(reason.to_string()), false);
        }
    }

    /// Every frame sent so far, parsed.
    pub fn sent(&self) -> Vec<Value> {
        self.state.lock().sent.clone()
    }

    /// Wire types of every frame sent so far.
    pub fn sent_types(&self) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter_map(|frame| frame.get("type").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Number of frames of wire type `kind` sent so far.
    pub fn count_sent(&self, kind: &str) -> usize {
        self.sent_types().iter().filter(|t| *t == kind).count()
    }

    /// Forget recorded frames.
    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// Number of `open()` calls.
    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    fn forget_in_broker(&self) {
        if let ServerMode::Broker(broker) = &self.mode {
            broker.forget(&self.weak);
        }
    }

    fn reply(&self, request: &Value) {
        let kind = request.get("type").and_then(Value::as_str).unwrap_or_default();
        if self.state.lock().muted.contains(kind) {
            return;
        }
        let replies = match &self.mode {
            ServerMode::Silent => Vec::new(),
            ServerMode::Acknowledging => acknowledge(request).into_iter().collect(),
            ServerMode::Broker(broker) => broker.handle(&self.weak, request),
        };
        for reply in replies {
            self.push_json(reply);
        }
    }
}

fn acknowledge(request: &Value) -> Option<Value> {
    let topic = request.get("topic").cloned().unwrap_or(Value::Null);
    let reply = match request.get("type").and_then(Value::as_str)? {
        "register" => json!({"type": "registered", "userId": request["userId"]}),
        "publish" => json!({"type": "published", "topic": topic, "message": PUBLISH_SUCCESS_MESSAGE}),
        "subscribe" => json!({"type": "subscribed", "topic": topic}),
        "unsubscribe" => json!({"type": "unsubscribed", "topic": topic}),
        "status" => json!({"type": "status", "connections": 1}),
        "users" => json!({"type": "users", "users": []}),
        "ping" => json!({"type": "pong"}),
        _ => return None,
    };
    Some(reply)
}

impl Transport for MockTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    fn endpoint(&self) -> String {
        "memory://mock".to_string()
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.lock().transport_state.clone() })
    }

    fn open(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let opened = {
                let mut state = self.state.lock();
                state.opens += 1;
                if state.connection.is_some() {
                    return Ok(());
                }
                if state.refuse_connections || state.failing_opens > 0 {
                    state.failing_opens = state.failing_opens.saturating_sub(1);
                    let reason = "connection refused".to_string();
                    state.transport_state = TransportState::Failed {
                        reason: reason.clone(),
                    };
                    Err(TransportError::ConnectionFailed(reason))
                } else {
                    state.next_connection_id += 1;
                    let id = state.next_connection_id;
                    state.connection = Some(id);
                    state.transport_state = TransportState::Connected;
                    Ok(id)
                }
            };
            match opened {
                Ok(id) => {
                    self.emitter.emit_opened(id, self.endpoint());
                    Ok(())
                }
                Err(e) => {
                    self.emitter.emit_error(e.clone(), Some("open".to_string()));
                    Err(e)
                }
            }
        })
    }

    fn send(&self, frame: String) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let request: Value = serde_json::from_str(&frame)
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            {
                let mut state = self.state.lock();
                if state.connection.is_none() {
                    drop(state);
                    self.emitter
                        .emit_error(TransportError::NotConnected, Some("send".to_string()));
                    return Err(TransportError::NotConnected);
                }
                state.sent.push(request.clone());
            }
            self.reply(&request);
            Ok(())
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let connection = {
                let mut state = self.state.lock();
                state.transport_state = TransportState::Disconnected;
                state.connection.take()
            };
            if let Some(id) = connection {
                self.forget_in_broker();
                self.emitter
                    .emit_closed(id, Some("closed by client".to_string()), true);
            }
            Ok(())
        })
    }

    fn take_events(&self) -> Option<TransportEventReceiver> {
        self.events.lock().take()
    }
}

#[derive(Default)]
struct BrokerState {
    registered: Vec<(Weak<MockTransport>, String, String)>,
    subscriptions: Vec<(Weak<MockTransport>, String)>,
}

/// Shared in-memory server routing publishes between mock transports.
#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl fmt::Debug for MockBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockBroker")
            .field("registered", &state.registered.len())
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}

impl MockBroker {
    /// A new empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport connected to this broker.
    pub fn transport(&self) -> Arc<MockTransport> {
        MockTransport::with_mode(ServerMode::Broker(self.clone()))
    }

    /// Topics with at least one subscriber, sorted and deduplicated.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .state
            .lock()
            .subscriptions
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        topics.sort();
        topics.dedup();
        topics
    }

    fn forget(&self, transport: &Weak<MockTransport>) {
        let mut state = self.state.lock();
        state.registered.retain(|(t, _, _)| !t.ptr_eq(transport));
        state.subscriptions.retain(|(t, _)| !t.ptr_eq(transport));
    }

    /// Replies for the sender. Notifications go straight to subscribers.
    fn handle(&self, sender: &Weak<MockTransport>, request: &Value) -> Vec<Value> {
        let kind = request.get("type").and_then(Value::as_str).unwrap_or_default();
        let topic = request.get("topic").and_then(Value::as_str).unwrap_or_default();
        let user_id = request.get("userId").and_then(Value::as_str).unwrap_or_default();

        match kind {
            "register" => {
                let user_type = request
                    .get("userType")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let mut state = self.state.lock();
                state.registered.retain(|(t, _, _)| !t.ptr_eq(sender));
                state
                    .registered
                    .push((sender.clone(), user_id.to_string(), user_type.to_string()));
            }
            "subscribe" => {
                let mut state = self.state.lock();
                if !state
                    .subscriptions
                    .iter()
                    .any(|(t, s)| t.ptr_eq(sender) && s == topic)
                {
                    state.subscriptions.push((sender.clone(), topic.to_string()));
                }
            }
            "unsubscribe" => {
                self.state
                    .lock()
                    .subscriptions
                    .retain(|(t, s)| !(t.ptr_eq(sender) && s == topic));
            }
            "publish" => self.fan_out(sender, topic, request),
            "status" => {
                let state = self.state.lock();
                return vec![json!({
                    "type": "status",
                    "connections": state.registered.len(),
                    "topics": state.subscriptions.len(),
                })];
            }
            "users" => {
                let users: Vec<Value> = self
                    .state
                    .lock()
                    .registered
                    .iter()
                    .map(|(_, id, role)| json!({"userId": id, "userType": role}))
                    .collect();
                return vec![json!({"type": "users", "users": users})];
            }
            _ => {}
        }
        acknowledge(request).into_iter().collect()
    }

    fn fan_out(&self, sender: &Weak<MockTransport>, topic: &str, request: &Value) {
        let (from_type, subscribers) = {
            let state = self.state.lock();
            let from_type = state
                .registered
                .iter()
                .find(|(t, _, _)| t.ptr_eq(sender))
                .map(|(_, _, role)| role.clone());
            let subscribers: Vec<Arc<MockTransport>> = state
                .subscriptions
                .iter()
                .filter(|(_, s)| s == topic)
                .filter_map(|(t, _)| t.upgrade())
                .collect();
            (from_type, subscribers)
        };

        let notification = json!({
            "type": "notification",
            "topic": topic,
            "from": request["userId"],
            "fromType": from_type,
            "message": request["data"],
            "timestamp": "2026-01-01T00:00:00.000Z",
        });
        for subscriber in subscribers {
            subscriber.push_json(notification.clone());
        }
    }
}
