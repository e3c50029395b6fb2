//! Shared log of store activity, in virtual time

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tandem_core::Consistency;
use tokio::time::Instant;

/// What a store did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    /// The store's sync procedure started running
    Started,
    /// The store settled a checkpoint
    Settled(Consistency),
    /// The store's sync procedure returned an error
    Failed,
}

/// One logged store action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationEvent {
    /// Store name
    pub store: String,
    /// What happened
    pub kind: InvocationKind,
    /// Time since the log was created
    pub at: Duration,
}

/// Ordered record of what every store did and when.
///
/// Cloning shares the log. Timestamps use `tokio::time`, so under a paused
/// clock they are exact virtual times.
#[derive(Debug, Clone)]
pub struct InvocationLog {
    origin: Instant,
    events: Arc<Mutex<Vec<InvocationEvent>>>,
}

impl InvocationLog {
    /// Create an empty log starting now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append an event stamped with the current time.
    pub fn record(&self, store: &str, kind: InvocationKind) {
        self.events.lock().push(InvocationEvent {
            store: store.to_string(),
            kind,
            at: self.origin.elapsed(),
        });
    }

    /// All events so far, oldest first.
    pub fn events(&self) -> Vec<InvocationEvent> {
        self.events.lock().clone()
    }

    /// When the named store first started, if it has.
    pub fn started_at(&self, store: &str) -> Option<Duration> {
        self.find(store, InvocationKind::Started).map(|e| e.at)
    }

    /// Whether the named store was ever started.
    pub fn was_started(&self, store: &str) -> bool {
        self.started_at(store).is_some()
    }

    /// Position of the first matching event, for ordering assertions.
    pub fn position(&self, store: &str, kind: InvocationKind) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|e| e.store == store && e.kind == kind)
    }

    fn find(&self, store: &str, kind: InvocationKind) -> Option<InvocationEvent> {
        self.events
            .lock()
            .iter()
            .find(|e| e.store == store && e.kind == kind)
            .cloned()
    }
}

impl Default for InvocationLog {
    fn default() -> Self {
        Self::new()
    }
}
