//! Pending request/response correlation.
//!
//! A caller that expects an answer to one submission registers a watch
//! (a success kind and a failure kind) before sending, then awaits the
//! returned [`Awaiting`]. The engine feeds every inbound event to
//! [`CorrelationTable::dispatch`]; the first event whose kind matches settles
//! the entry and removes it. Each entry is settled at most once.
//!
//! Matching is by event kind only. The agent does not reliably echo
//! correlation ids on its answers.
//!
//! Dropping an [`Awaiting`] removes its entry, so abandoned waits (timeouts,
//! failed sends, cancelled tasks) never accumulate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::protocol::{Event, EventKind};

/// How a pending entry was settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// An event of the success kind arrived.
    Resolved(Event),
    /// An event of the failure kind arrived.
    Rejected(Event),
}

#[derive(Debug)]
struct Pending {
    success: EventKind,
    failure: EventKind,
    sink: oneshot::Sender<Settlement>,
}

type Entries = HashMap<u64, Pending>;

/// Table of outstanding correlations, keyed by an internal token.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    next_token: AtomicU64,
    entries: Mutex<Entries>,
}

impl CorrelationTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watch settled by the first `success` or `failure` event.
    ///
    /// Register before sending the request so an immediate answer is not
    /// missed.
    #[must_use]
    pub fn register(self: &Arc<Self>, success: EventKind, failure: EventKind) -> Awaiting {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (sink, receiver) = oneshot::channel();
        lock(&self.entries).insert(
            token,
            Pending {
                success,
                failure,
                sink,
            },
        );
        debug!(token, %success, %failure, "correlation registered");

        Awaiting {
            token,
            table: Arc::clone(self),
            receiver,
        }
    }

    /// Settle every entry watching the kind of `event`.
    ///
    /// Returns the number of entries settled.
    #[must_use]
    pub fn dispatch(&self, event: &Event) -> usize {
        let kind = event.kind();
        let mut entries = lock(&self.entries);
        let matched: Vec<u64> = entries
            .iter()
            .filter(|(_, pending)| pending.success == kind || pending.failure == kind)
            .map(|(token, _)| *token)
            .collect();

        for token in &matched {
            let Some(pending) = entries.remove(token) else {
                continue;
            };
            let settlement = if pending.success == kind {
                Settlement::Resolved(event.clone())
            } else {
                Settlement::Rejected(event.clone())
            };
            if pending.sink.send(settlement).is_err() {
                debug!(token, "correlation waiter already gone");
            } else {
                debug!(token, %kind, "correlation settled");
            }
        }

        matched.len()
    }

    /// Remove the entry for `token` without settling it.
    ///
    /// Returns `false` if it was already settled or removed.
    #[must_use]
    pub fn cancel(&self, token: u64) -> bool {
        lock(&self.entries).remove(&token).is_some()
    }

    /// Number of outstanding entries.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// `true` when nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

/// Receiving half of a registered correlation.
///
/// Dropping it before settlement removes the entry from the table.
#[derive(Debug)]
pub struct Awaiting {
    token: u64,
    table: Arc<CorrelationTable>,
    receiver: oneshot::Receiver<Settlement>,
}

impl Awaiting {
    /// Token identifying the entry.
    #[must_use]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Wait for the entry to be settled.
    ///
    /// Returns `None` if the entry was cancelled through
    /// [`CorrelationTable::cancel`] instead.
    pub async fn settled(mut self) -> Option<Settlement> {
        (&mut self.receiver).await.ok()
    }
}

impl Drop for Awaiting {
    fn drop(&mut self) {
        if self.table.cancel(self.token) {
            debug!(token = self.token, "correlation abandoned");
        }
    }
}

fn lock(entries: &Mutex<Entries>) -> MutexGuard<'_, Entries> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
