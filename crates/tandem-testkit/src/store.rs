//! Scripted stores with controllable timing and failures

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tandem_core::{Consistency, MutationError, MutationRecord, MutationStore, Result};
use tokio::time::Instant;

use crate::invocations::{InvocationKind, InvocationLog};

/// How a [`SimulatedStore`] fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Reject both checkpoints and return the error as soon as the store starts
    Immediate(MutationError),
    /// Reject both checkpoints at their scheduled times; `sync` itself returns `Ok`
    Checkpoints(MutationError),
    /// Resolve `written`, reject `committed`, then return the error
    Commit(MutationError),
}

/// A store that settles its record on a fixed schedule.
///
/// Delays are measured from the moment `sync` starts. Checkpoints settle in
/// chronological order, `written` first on a tie.
#[derive(Debug, Clone)]
pub struct SimulatedStore<T> {
    name: String,
    value: T,
    written_after: Duration,
    committed_after: Duration,
    failure: Option<ScriptedFailure>,
    log: InvocationLog,
}

impl<T: Clone + Send + Sync + 'static> SimulatedStore<T> {
    /// A store that settles both checkpoints with `value` immediately.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
            written_after: Duration::ZERO,
            committed_after: Duration::ZERO,
            failure: None,
            log: InvocationLog::new(),
        }
    }

    /// Settle `written` this long after starting.
    pub fn written_after(mut self, delay: Duration) -> Self {
        self.written_after = delay;
        self
    }

    /// Settle `committed` this long after starting.
    pub fn committed_after(mut self, delay: Duration) -> Self {
        self.committed_after = delay;
        self
    }

    /// Fail as scripted.
    pub fn failing(mut self, failure: ScriptedFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Record activity into a shared log.
    pub fn with_log(mut self, log: InvocationLog) -> Self {
        self.log = log;
        self
    }

    /// The log this store writes to.
    pub fn log(&self) -> &InvocationLog {
        &self.log
    }

    /// Wrap in an `Arc` for use as a `dyn MutationStore`.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    async fn run(&self, record: MutationRecord<T>) -> Result<()> {
        let started = Instant::now();
        self.log.record(&self.name, InvocationKind::Started);

        if let Some(ScriptedFailure::Immediate(err)) = &self.failure {
            record.settle_both(Err(err.clone()));
            self.log.record(&self.name, InvocationKind::Failed);
            return Err(err.clone());
        }

        let mut schedule = [
            (Consistency::Written, self.written_after),
            (Consistency::Committed, self.committed_after),
        ];
        schedule.sort_by_key(|(_, delay)| *delay);

        for (checkpoint, delay) in schedule {
            tokio::time::sleep_until(started + delay).await;
            let outcome = match (&self.failure, checkpoint) {
                (Some(ScriptedFailure::Checkpoints(err)), _)
                | (Some(ScriptedFailure::Commit(err)), Consistency::Committed) => Err(err.clone()),
                _ => Ok(self.value.clone()),
            };
            record.latch(checkpoint).settle(outcome);
            self.log.record(&self.name, InvocationKind::Settled(checkpoint));
        }

        if let Some(ScriptedFailure::Commit(err)) = &self.failure {
            self.log.record(&self.name, InvocationKind::Failed);
            return Err(err.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> MutationStore<T> for SimulatedStore<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sync(&self, record: MutationRecord<T>) -> Result<()> {
        self.run(record).await
    }
}

/// Closure form of a store, as taken by `execute_batched_write`.
pub fn store_procedure<T>(
    store: Arc<dyn MutationStore<T>>,
) -> impl FnOnce(MutationRecord<T>) -> BoxFuture<'static, Result<()>> + Send + 'static
where
    T: Send + 'static,
{
    move |record| Box::pin(async move { store.sync(record).await })
}
