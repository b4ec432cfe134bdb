//! In-process publish/subscribe for decoded agent events.
//!
//! Two channels exist:
//!
//! | Channel             | Carries                                           |
//! |---------------------|---------------------------------------------------|
//! | [`Channel::Response`] | every event decoded from the agent's stdout     |
//! | [`Channel::Error`]    | diagnostics and protocol violations, as synthetic `error` events |
//!
//! Delivery is synchronous on the publishing task, in registration order.
//! Handlers run against a snapshot of the registry, so a handler may
//! unsubscribe itself (or others) while an event is being delivered. A
//! panicking handler is isolated: the panic is logged and the remaining
//! handlers still receive the event.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::error;

use crate::protocol::Event;

/// Event bus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Successfully decoded inbound events.
    Response,
    /// Process-level failures and protocol violations.
    Error,
}

impl Channel {
    /// Channel name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Error => "error",
        }
    }
}

/// Boxed event handler.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

type Registry = Mutex<HashMap<Channel, Vec<(u64, Handler)>>>;

/// Channel-keyed handler registry.
///
/// Instance-scoped: each [`Session`](crate::session::Session) owns its own bus.
pub struct EventBus {
    next_id: AtomicU64,
    handlers: Arc<Registry>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register `handler` on `channel`.
    ///
    /// The returned [`Subscription`] removes the handler when
    /// [`Subscription::unsubscribe`] is called. Dropping it leaves the handler
    /// registered.
    #[must_use]
    pub fn subscribe<F>(&self, channel: Channel, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.handlers)
            .entry(channel)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            id,
            channel,
            registry: Arc::downgrade(&self.handlers),
        }
    }

    /// Deliver `event` to every handler registered on `channel`.
    pub fn publish(&self, channel: Channel, event: &Event) {
        let snapshot: Vec<(u64, Handler)> = lock(&self.handlers)
            .get(&channel)
            .cloned()
            .unwrap_or_default();

        for (id, handler) in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
            if let Err(payload) = outcome {
                error!(
                    channel = channel.as_str(),
                    subscription = id,
                    panic = panic_message(payload.as_ref()),
                    "event bus: handler panicked"
                );
            }
        }
    }

    /// Number of handlers currently registered on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        lock(&self.handlers).get(&channel).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("response", &self.subscriber_count(Channel::Response))
            .field("error", &self.subscriber_count(Channel::Error))
            .finish()
    }
}

/// Handle that removes one handler from the bus.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    channel: Channel,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the handler. Idempotent; a no-op once the bus is gone.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut handlers = lock(&registry);
        if let Some(list) = handlers.get_mut(&self.channel) {
            list.retain(|(id, _)| *id != self.id);
        }
    }

    /// Channel the handler is registered on.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<Channel, Vec<(u64, Handler)>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
