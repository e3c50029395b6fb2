//! Runtime-agnostic task spawning trait.

use futures::future::BoxFuture;

use crate::errors::Result;

/// Task spawning contract for runtime implementations.
///
/// The coordinator runs store procedures and checkpoint joins through a
/// spawner so that they keep making progress after the caller stops awaiting
/// the write. Spawned tasks are never cancelled by the coordinator.
pub trait TaskSpawner: Send + Sync {
    /// Spawn a background task.
    ///
    /// Fails without running `fut` when there is nothing to run it on, such
    /// as outside any runtime.
    fn spawn(&self, fut: BoxFuture<'static, ()>) -> Result<()>;
}
