//! Mutation coordinator
//!
//! Applies one logical write to a remote and a local store, remote first, and
//! reports the combined progress through a caller-supplied target record.
//!
//! The local write starts only once the remote record's earliest checkpoint
//! has settled successfully. The target's `written` checkpoint is the join of
//! both stores' `written` checkpoints; at `Consistency::Committed` the same is
//! done for `committed`.
//!
//! The future returned by [`MutationCoordinator::execute_batched_write`] and
//! the target record are two separate views of the same work. Store procedures
//! and joins are spawned, so dropping the future does not stop the write, and
//! callers may track the target's checkpoints instead.
//!
//! If the spawner cannot run background work, for example outside a Tokio
//! runtime, the write is rejected with an internal
//! [`MutationError`](tandem_core::MutationError) instead of panicking.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, Either};
use tandem_core::{
    Consistency, Latch, LatchFuture, MutationRecord, MutationStore, Result, TaskSpawner,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::CoordinatorConfig;
use crate::runtime::TaskRegistry;

/// Sequences remote/local writes and fans their checkpoints into a target.
#[derive(Clone)]
pub struct MutationCoordinator {
    consistency: Consistency,
    spawner: Arc<dyn TaskSpawner>,
    tasks: Option<Arc<TaskRegistry>>,
}

impl MutationCoordinator {
    /// Create a coordinator that spawns onto the ambient Tokio runtime.
    ///
    /// Background work is tracked in a [`TaskRegistry`], reachable through
    /// [`Self::tasks`].
    pub fn create(consistency: Consistency) -> Self {
        let tasks = Arc::new(TaskRegistry::new());
        Self {
            consistency,
            spawner: tasks.clone(),
            tasks: Some(tasks),
        }
    }

    /// Create a coordinator from configuration.
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::create(config.consistency)
    }

    /// Create a coordinator with a custom spawner.
    pub fn with_spawner(consistency: Consistency, spawner: Arc<dyn TaskSpawner>) -> Self {
        Self {
            consistency,
            spawner,
            tasks: None,
        }
    }

    /// The consistency level applied to every write.
    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    /// Registry of spawned work, for coordinators built with [`Self::create`].
    ///
    /// Await [`TaskRegistry::join_all`] on it to drain in-flight writes before
    /// shutting down. `None` for a custom spawner.
    pub fn tasks(&self) -> Option<&TaskRegistry> {
        self.tasks.as_deref()
    }

    /// Coordinate a write with fresh remote and local records.
    ///
    /// See [`MutationCoordinator::execute_batched_write_with`].
    pub fn execute_batched_write<T, R, RFut, L, LFut>(
        &self,
        target: &MutationRecord<T>,
        remote_sync: R,
        local_sync: L,
    ) -> LatchFuture<()>
    where
        T: Clone + Send + 'static,
        R: FnOnce(MutationRecord<T>) -> RFut,
        RFut: Future<Output = Result<()>> + Send + 'static,
        L: FnOnce(MutationRecord<T>) -> LFut + Send + 'static,
        LFut: Future<Output = Result<()>> + Send + 'static,
    {
        self.execute_batched_write_with(
            target,
            remote_sync,
            local_sync,
            MutationRecord::new(),
            MutationRecord::new(),
        )
    }

    /// Coordinate a write through caller-supplied remote and local records.
    ///
    /// 1. `remote_sync` is started against `remote_record`. If it returns an
    ///    error the write fails with it immediately.
    /// 2. When the first of the remote `written`/`committed` checkpoints
    ///    settles, `local_sync` is started against `local_record`, or the
    ///    write fails if that checkpoint was rejected. `local_sync` is never
    ///    started before the remote side succeeds.
    /// 3. Both records are joined into `target` (see [`Self::batched`]).
    /// 4. The returned future settles with the target checkpoint selected by
    ///    the consistency level.
    ///
    /// Only the first error to reach the returned future is reported. The
    /// individual records keep their own outcomes.
    pub fn execute_batched_write_with<T, R, RFut, L, LFut>(
        &self,
        target: &MutationRecord<T>,
        remote_sync: R,
        local_sync: L,
        remote_record: MutationRecord<T>,
        local_record: MutationRecord<T>,
    ) -> LatchFuture<()>
    where
        T: Clone + Send + 'static,
        R: FnOnce(MutationRecord<T>) -> RFut,
        RFut: Future<Output = Result<()>> + Send + 'static,
        L: FnOnce(MutationRecord<T>) -> LFut + Send + 'static,
        LFut: Future<Output = Result<()>> + Send + 'static,
    {
        let write_id = Uuid::new_v4();
        let completion: Latch<()> = Latch::new();
        debug!(%write_id, consistency = %self.consistency, "Starting coordinated write");

        let remote = remote_sync(remote_record.clone());
        let failed = completion.clone();
        let spawned = self.spawn(async move {
            if let Err(err) = remote.await {
                warn!(%write_id, error = %err, "Remote sync failed");
                failed.reject(err);
            }
        });
        if let Err(err) = spawned {
            error!(%write_id, error = %err, "Unable to start coordinated write");
            target.written.reject(err.clone());
            if self.consistency.requires_commit() {
                target.committed.reject(err.clone());
            }
            completion.reject(err);
            return completion.get();
        }

        let earliest = future::select(remote_record.written.get(), remote_record.committed.get());
        let failed = completion.clone();
        let local_record_handle = local_record.clone();
        let spawned = self.spawn(async move {
            let outcome = match earliest.await {
                Either::Left((outcome, _)) | Either::Right((outcome, _)) => outcome,
            };
            if let Err(err) = outcome {
                debug!(%write_id, error = %err, "Remote checkpoint rejected, skipping local sync");
                failed.reject(err);
                return;
            }

            debug!(%write_id, "Remote checkpoint reached, starting local sync");
            if let Err(err) = local_sync(local_record_handle).await {
                warn!(%write_id, error = %err, "Local sync failed");
                failed.reject(err);
            }
        });
        if let Err(err) = spawned {
            error!(%write_id, error = %err, "Unable to schedule local sync");
            local_record.settle_both(Err(err.clone()));
            completion.reject(err);
        }

        self.batched(&remote_record, &local_record, target);

        let settled = completion.clone();
        target.latch(self.consistency).on_settle(move |outcome| {
            if settled.settle(outcome.map(|_| ())) {
                debug!(%write_id, "Coordinated write settled");
            }
        });

        completion.get()
    }

    /// Coordinate a write between two stores.
    pub fn execute_store_write<T>(
        &self,
        target: &MutationRecord<T>,
        remote: Arc<dyn MutationStore<T>>,
        local: Arc<dyn MutationStore<T>>,
    ) -> LatchFuture<()>
    where
        T: Clone + Send + 'static,
    {
        debug!(remote = remote.name(), local = local.name(), "Coordinating store write");
        self.execute_batched_write(
            target,
            move |record| async move { remote.sync(record).await },
            move |record| async move { local.sync(record).await },
        )
    }

    /// Join two records into `target`.
    ///
    /// `target.written` settles once both inputs' `written` checkpoints have:
    /// with the remote value if both succeeded, otherwise with the first
    /// error. At `Consistency::Committed` the same join is made for
    /// `committed`; at `Consistency::Written`, `target.committed` is left
    /// alone.
    pub fn batched<T>(
        &self,
        remote: &MutationRecord<T>,
        local: &MutationRecord<T>,
        target: &MutationRecord<T>,
    ) where
        T: Clone + Send + 'static,
    {
        self.batch_latches(&remote.written, &local.written, &target.written, Consistency::Written);

        if self.consistency.requires_commit() {
            self.batch_latches(
                &remote.committed,
                &local.committed,
                &target.committed,
                Consistency::Committed,
            );
        }
    }

    fn batch_latches<T>(
        &self,
        remote: &Latch<T>,
        local: &Latch<T>,
        target: &Latch<T>,
        checkpoint: Consistency,
    ) where
        T: Clone + Send + 'static,
    {
        let joined = future::try_join(remote.get(), local.get());
        let settled = target.clone();
        let spawned = self.spawn(async move {
            match joined.await {
                Ok((remote_value, _local_value)) => {
                    settled.resolve(remote_value);
                }
                Err(err) => {
                    debug!(%checkpoint, error = %err, "Batched checkpoint rejected");
                    settled.reject(err);
                }
            }
        });
        if let Err(err) = spawned {
            target.reject(err);
        }
    }

    /// Report a plain async result through both checkpoints of `target`.
    ///
    /// A successful result is converted once and resolves `written` and then
    /// `committed` with the same value. A failed result rejects both with the
    /// original error. A converter error is logged and leaves both checkpoints
    /// pending.
    pub fn handle<V, T, F, C>(&self, source: F, target: &MutationRecord<T>, converter: C)
    where
        V: Send + 'static,
        T: Clone + Send + 'static,
        F: Future<Output = Result<V>> + Send + 'static,
        C: FnOnce(V) -> Result<T> + Send + 'static,
    {
        let settled = target.clone();
        let spawned = self.spawn(async move {
            match source.await {
                Ok(result) => match converter(result) {
                    Ok(value) => settled.settle_both(Ok(value)),
                    Err(err) => error!(error = %err, "Unable to resolve mutation"),
                },
                Err(err) => settled.settle_both(Err(err)),
            }
        });
        if let Err(err) = spawned {
            target.settle_both(Err(err));
        }
    }

    /// Forward each checkpoint of `source` into the same checkpoint of `target`.
    ///
    /// Values pass through `converter`; errors pass through unchanged. Each
    /// checkpoint is forwarded the moment the source settles it.
    pub fn pipe<T, V, C>(
        &self,
        source: &MutationRecord<T>,
        target: &MutationRecord<V>,
        converter: C,
    ) where
        T: Clone + Send + 'static,
        V: Clone + Send + 'static,
        C: Fn(T) -> V + Send + Sync + 'static,
    {
        self.try_pipe(source, target, move |value| Ok(converter(value)));
    }

    /// Like [`Self::pipe`], but a converter error rejects the target checkpoint.
    pub fn try_pipe<T, V, C>(
        &self,
        source: &MutationRecord<T>,
        target: &MutationRecord<V>,
        converter: C,
    ) where
        T: Clone + Send + 'static,
        V: Clone + Send + 'static,
        C: Fn(T) -> Result<V> + Send + Sync + 'static,
    {
        let converter = Arc::new(converter);
        pipe_latch(&source.written, &target.written, converter.clone());
        pipe_latch(&source.committed, &target.committed, converter);
    }

    fn spawn<F>(&self, fut: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawner.spawn(Box::pin(fut))
    }
}

fn pipe_latch<T, V, C>(source: &Latch<T>, target: &Latch<V>, converter: Arc<C>)
where
    T: Clone + Send + 'static,
    V: Clone + Send + 'static,
    C: Fn(T) -> Result<V> + Send + Sync + 'static,
{
    let target = target.clone();
    source.on_settle(move |outcome| {
        target.settle(outcome.and_then(|value| converter(value)));
    });
}

impl fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("consistency", &self.consistency)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::time::Duration;
    use tandem_core::{CheckpointStatus, MutationError};

    type Records<T> = (MutationRecord<T>, MutationRecord<T>, MutationRecord<T>);

    fn records<T: Clone + Send + 'static>() -> Records<T> {
        (MutationRecord::new(), MutationRecord::new(), MutationRecord::new())
    }

    async fn settle_spawned() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_written_uses_remote_value() {
        let coordinator = MutationCoordinator::create(Consistency::Written);
        let (remote, local, target) = records();
        coordinator.batched(&remote, &local, &target);

        remote.written.resolve("remote");
        settle_spawned().await;
        assert!(!target.written.is_settled());

        local.written.resolve("local");
        assert_eq!(target.written.get().await, Ok("remote"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_written_never_touches_committed() {
        let coordinator = MutationCoordinator::create(Consistency::Written);
        let (remote, local, target) = records();
        coordinator.batched(&remote, &local, &target);

        remote.settle_both(Ok(1u32));
        local.settle_both(Ok(2u32));
        assert_eq!(target.written.get().await, Ok(1));
        settle_spawned().await;
        assert_eq!(target.progress().committed, CheckpointStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_rejects_on_either_failure() {
        let coordinator = MutationCoordinator::create(Consistency::Committed);
        let (remote, local, target) = records();
        coordinator.batched(&remote, &local, &target);

        // local fails while remote is still pending: the join rejects at once
        local.committed.reject(MutationError::store("local disk"));
        assert_eq!(
            target.committed.get().await,
            Err(MutationError::store("local disk"))
        );

        remote.written.resolve(1u8);
        local.written.resolve(2u8);
        assert_eq!(target.written.get().await, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_committed_is_independent_of_written() {
        let coordinator = MutationCoordinator::create(Consistency::Committed);
        let (remote, local, target) = records();
        coordinator.batched(&remote, &local, &target);

        remote.written.reject(MutationError::store("ack lost"));
        remote.committed.resolve(7u8);
        local.settle_both(Ok(8u8));

        assert_eq!(target.committed.get().await, Ok(7));
        assert_eq!(target.written.get().await, Err(MutationError::store("ack lost")));
    }

    #[tokio::test]
    async fn test_handle_resolves_both_checkpoints() {
        let coordinator = MutationCoordinator::create(Consistency::Committed);
        let target = MutationRecord::new();
        coordinator.handle(async { Ok(21u32) }, &target, |v| Ok(v * 2));

        assert_eq!(target.written.get().await, Ok(42));
        assert_eq!(target.committed.get().await, Ok(42));
    }

    #[tokio::test]
    async fn test_handle_rejects_both_with_source_error() {
        let coordinator = MutationCoordinator::create(Consistency::Committed);
        let target: MutationRecord<u32> = MutationRecord::new();
        coordinator.handle(
            async { Err::<u32, _>(MutationError::store("unreachable")) },
            &target,
            Ok,
        );

        let expected = Err(MutationError::store("unreachable"));
        assert_eq!(target.written.get().await, expected);
        assert_eq!(target.committed.get().await, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_swallows_conversion_failure() {
        let coordinator = MutationCoordinator::create(Consistency::Committed);
        let target: MutationRecord<String> = MutationRecord::new();
        coordinator.handle(async { Ok(5u8) }, &target, |_| {
            Err(MutationError::conversion("not a string"))
        });

        settle_spawned().await;
        assert_eq!(target.progress().settled_count(), 0);
    }

    #[test]
    fn test_pipe_mirrors_settlement_order() {
        // pipe needs no runtime: forwarding happens in settlement continuations
        let coordinator = MutationCoordinator::with_spawner(
            Consistency::Committed,
            Arc::new(NoopSpawner),
        );
        let source = MutationRecord::new();
        let target = MutationRecord::new();
        coordinator.pipe(&source, &target, |v: u32| v.to_string());

        source.written.resolve(4);
        assert_eq!(target.written.outcome(), Some(Ok("4".to_string())));
        assert!(!target.committed.is_settled());

        source.committed.resolve(4);
        assert_eq!(target.committed.outcome(), Some(Ok("4".to_string())));
    }

    #[test]
    fn test_pipe_forwards_errors_unchanged() {
        let coordinator =
            MutationCoordinator::with_spawner(Consistency::Written, Arc::new(NoopSpawner));
        let source: MutationRecord<u32> = MutationRecord::new();
        let target: MutationRecord<u64> = MutationRecord::new();
        coordinator.pipe(&source, &target, u64::from);

        source.committed.reject(MutationError::store("quota"));
        assert_eq!(
            target.committed.outcome(),
            Some(Err(MutationError::store("quota")))
        );
        assert!(!target.written.is_settled());
    }

    #[test]
    fn test_try_pipe_rejects_on_conversion_failure() {
        let coordinator =
            MutationCoordinator::with_spawner(Consistency::Written, Arc::new(NoopSpawner));
        let source = MutationRecord::new();
        let target: MutationRecord<u8> = MutationRecord::new();
        coordinator.try_pipe(&source, &target, |v: u32| {
            u8::try_from(v).map_err(|e| MutationError::conversion(e.to_string()))
        });

        source.written.resolve(300);
        source.committed.resolve(3);
        assert!(matches!(
            target.written.outcome(),
            Some(Err(MutationError::Conversion { .. }))
        ));
        assert_eq!(target.committed.outcome(), Some(Ok(3)));
    }

    #[test]
    fn test_write_outside_runtime_is_rejected() {
        let coordinator = MutationCoordinator::create(Consistency::Committed);
        let target: MutationRecord<u8> = MutationRecord::new();
        let done = coordinator.execute_batched_write(
            &target,
            |_| async { Ok::<(), MutationError>(()) },
            |_| async { Ok::<(), MutationError>(()) },
        );

        let err = block_on(done).unwrap_err();
        assert!(matches!(err, MutationError::Internal { .. }));
        assert!(matches!(
            target.committed.outcome(),
            Some(Err(MutationError::Internal { .. }))
        ));
        assert!(target.progress().is_complete());
    }

    #[test]
    fn test_handle_outside_runtime_rejects_target() {
        let coordinator = MutationCoordinator::create(Consistency::Written);
        let target: MutationRecord<u8> = MutationRecord::new();
        coordinator.handle(async { Ok::<u8, MutationError>(1) }, &target, Ok);

        assert!(matches!(
            target.written.outcome(),
            Some(Err(MutationError::Internal { .. }))
        ));
        assert!(target.progress().has_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_drain_dropped_write() {
        let coordinator = MutationCoordinator::create(Consistency::Committed);
        let target: MutationRecord<u8> = MutationRecord::new();
        drop(coordinator.execute_batched_write(
            &target,
            |record: MutationRecord<u8>| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                record.settle_both(Ok(1));
                Ok::<(), MutationError>(())
            },
            |record: MutationRecord<u8>| async move {
                record.settle_both(Ok(2));
                Ok::<(), MutationError>(())
            },
        ));

        let tasks = coordinator.tasks().unwrap();
        assert!(tasks.active_tasks() > 0);
        tasks.join_all().await;
        assert_eq!(tasks.active_tasks(), 0);
        assert_eq!(target.committed.outcome(), Some(Ok(1)));
    }

    #[test]
    fn test_custom_spawner_has_no_registry() {
        let coordinator =
            MutationCoordinator::with_spawner(Consistency::Written, Arc::new(NoopSpawner));
        assert!(coordinator.tasks().is_none());
    }

    struct NoopSpawner;

    impl TaskSpawner for NoopSpawner {
        fn spawn(&self, _fut: futures::future::BoxFuture<'static, ()>) -> Result<()> {
            Ok(())
        }
    }
}
