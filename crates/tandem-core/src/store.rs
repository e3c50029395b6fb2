//! Store seam consumed by the coordinator

use async_trait::async_trait;

use crate::errors::Result;
use crate::record::MutationRecord;

/// A backend that applies one mutation and reports its progress.
///
/// `sync` must eventually settle both checkpoints of the record it is given,
/// successfully or not. A store that leaves a checkpoint pending stalls every
/// join waiting on it. Returning `Err` fails the coordinated write as soon as
/// the error arrives, independently of the record's checkpoints.
#[async_trait]
pub trait MutationStore<T: Send + 'static>: Send + Sync {
    /// Short name used in logs, e.g. `"remote"`.
    fn name(&self) -> &str;

    /// Apply the mutation, settling `record` along the way.
    async fn sync(&self, record: MutationRecord<T>) -> Result<()>;
}
