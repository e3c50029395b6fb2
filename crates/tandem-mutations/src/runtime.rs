//! Tokio task registry for coordinator background work.
//!
//! Tracks the store procedures and checkpoint joins a coordinator spawns so a
//! host can wait for them during shutdown. Tasks run to completion; nothing
//! here aborts them.

use std::future::Future;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tandem_core::{MutationError, Result, TaskSpawner};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Spawns onto the ambient Tokio runtime and remembers the handles.
///
/// Spawning outside a Tokio runtime fails with [`MutationError::Internal`].
#[derive(Debug, Default)]
pub struct TaskRegistry {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task and track its handle.
    pub fn spawn<F>(&self, fut: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| MutationError::internal(format!("No Tokio runtime to spawn on: {e}")))?;
        let handle = runtime.spawn(fut);
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        Ok(())
    }

    /// Number of tracked tasks that have not finished yet.
    pub fn active_tasks(&self) -> usize {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.len()
    }

    /// Wait for every tracked task, including ones spawned while waiting.
    pub async fn join_all(&self) {
        loop {
            let drained: Vec<_> = self.handles.lock().drain(..).collect();
            if drained.is_empty() {
                return;
            }
            for handle in drained {
                if let Err(err) = handle.await {
                    tracing::error!(error = %err, "Coordinator task panicked");
                }
            }
        }
    }
}

impl TaskSpawner for TaskRegistry {
    fn spawn(&self, fut: BoxFuture<'static, ()>) -> Result<()> {
        TaskRegistry::spawn(self, fut)
    }
}
