//! Lifecycle event fan-out.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::error;

use fleetpush_protocol::UserType;

use crate::error::ClientError;

/// Event categories listeners can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Transport opened
    Connect,
    /// Transport closed
    Disconnect,
    /// Something went wrong outside a caller's request
    Error,
    /// Any parseable inbound frame
    Message,
}

/// An event delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Transport opened; registration follows.
    Connect {
        /// Own user id
        user_id: String,
        /// Own role
        user_type: UserType,
    },
    /// Transport closed, for any reason.
    Disconnect {
        /// Own user id
        user_id: String,
        /// Close reason, when known
        reason: Option<String>,
    },
    /// Frame-level, server-reported or terminal error.
    Error(ClientError),
    /// Raw inbound frame, after correlation and topic dispatch.
    Message(Value),
}

impl ClientEvent {
    /// Category of this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connect { .. } => EventKind::Connect,
            Self::Disconnect { .. } => EventKind::Disconnect,
            Self::Error(_) => EventKind::Error,
            Self::Message(_) => EventKind::Message,
        }
    }
}

/// Handle returned by `on`, used with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Event listener callback.
pub type EventListener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, EventListener)>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .listeners
            .read()
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub(crate) fn on(&self, kind: EventKind, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.write().entry(kind).or_default().push((id, listener));
        id
    }

    pub(crate) fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    /// Deliver to every listener of the event's kind, in registration order.
    ///
    /// Listeners are snapshotted first, so a listener may call `on`/`off`.
    pub(crate) fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();
        let snapshot: Vec<EventListener> = self
            .listeners
            .read()
            .get(&kind)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in snapshot {
            call_isolated("event listener", || listener(event));
        }
    }
}

/// Run a user callback, containing any panic. Returns `false` if it panicked.
pub(crate) fn call_isolated<F: FnOnce()>(context: &str, f: F) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            error!(context, panic = %panic_message(payload.as_ref()), "Callback panicked");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
