//! Mutation records - the written/committed checkpoint pair of one write

use serde::{Deserialize, Serialize};

use crate::consistency::Consistency;
use crate::errors::Settlement;
use crate::latch::{Latch, LatchFuture};

/// The two checkpoints of one logical write.
///
/// Cloning shares the underlying latches, so a store, the coordinator and any
/// progress observer can each hold their own handle to the same record. A
/// record made with [`MutationRecord::new`] is the same as one a caller builds
/// and passes in; tracking progress is opt-in without special cases.
///
/// Producers are expected to settle `written` before `committed`. This is not
/// enforced; a record whose `committed` settles first logs a warning.
#[derive(Clone, Debug)]
pub struct MutationRecord<T> {
    /// Settles once a store has accepted the write
    pub written: Latch<T>,
    /// Settles once a store has durably persisted the write
    pub committed: Latch<T>,
}

impl<T: Clone + Send + 'static> MutationRecord<T> {
    /// Create a record with two pending checkpoints.
    pub fn new() -> Self {
        let written = Latch::new();
        let committed = Latch::new();

        let observed = written.observer();
        committed.on_settle(move |_| {
            if !observed.is_settled() {
                tracing::warn!("committed checkpoint settled before written");
            }
        });

        Self { written, committed }
    }

    /// The latch for a given checkpoint.
    pub fn latch(&self, checkpoint: Consistency) -> &Latch<T> {
        match checkpoint {
            Consistency::Written => &self.written,
            Consistency::Committed => &self.committed,
        }
    }

    /// Future for the given checkpoint's outcome.
    pub fn wait_for(&self, checkpoint: Consistency) -> LatchFuture<T> {
        self.latch(checkpoint).get()
    }

    /// Settle both checkpoints with the same outcome, `written` first.
    ///
    /// Models an atomic store where accepting a write and persisting it are the
    /// same event.
    pub fn settle_both(&self, outcome: Settlement<T>) {
        self.written.settle(outcome.clone());
        self.committed.settle(outcome);
    }

    /// Point-in-time snapshot of both checkpoints.
    pub fn progress(&self) -> MutationProgress {
        MutationProgress {
            written: CheckpointStatus::of(&self.written),
            committed: CheckpointStatus::of(&self.committed),
        }
    }
}

impl<T: Clone + Send + 'static> Default for MutationRecord<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one checkpoint, without its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    /// Not settled yet
    Pending,
    /// Settled successfully
    Fulfilled,
    /// Settled with an error
    Rejected,
}

impl CheckpointStatus {
    fn of<T: Clone + Send + 'static>(latch: &Latch<T>) -> Self {
        match latch.outcome() {
            None => CheckpointStatus::Pending,
            Some(Ok(_)) => CheckpointStatus::Fulfilled,
            Some(Err(_)) => CheckpointStatus::Rejected,
        }
    }

    /// Whether the checkpoint has settled either way.
    pub fn is_settled(&self) -> bool {
        !matches!(self, CheckpointStatus::Pending)
    }
}

/// Snapshot of a record's checkpoints, e.g. for a sync progress indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationProgress {
    /// Status of the `written` checkpoint
    pub written: CheckpointStatus,
    /// Status of the `committed` checkpoint
    pub committed: CheckpointStatus,
}

impl MutationProgress {
    /// Number of settled checkpoints, 0 to 2.
    pub fn settled_count(&self) -> usize {
        usize::from(self.written.is_settled()) + usize::from(self.committed.is_settled())
    }

    /// Whether both checkpoints have settled.
    pub fn is_complete(&self) -> bool {
        self.settled_count() == 2
    }

    /// Whether either checkpoint was rejected.
    pub fn has_failed(&self) -> bool {
        self.written == CheckpointStatus::Rejected || self.committed == CheckpointStatus::Rejected
    }
}
