//! Tandem Mutations - remote-before-local write coordination
//!
//! [`MutationCoordinator`] drives one logical write through a remote and a
//! local store and reports combined progress through a target
//! [`MutationRecord`](tandem_core::MutationRecord):
//!
//! - `execute_batched_write`: remote first, local once the remote side has
//!   reached any checkpoint, both joined into the target.
//! - `batched`: two-of-two join of two records into a third.
//! - `handle`: report a plain async result through both checkpoints.
//! - `pipe` / `try_pipe`: forward one record's checkpoints into another.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tandem_core::{Consistency, MutationRecord};
//! use tandem_mutations::MutationCoordinator;
//!
//! let coordinator = MutationCoordinator::create(Consistency::Written);
//! let target = MutationRecord::new();
//!
//! let done = coordinator.execute_batched_write(&target, remote_sync, local_sync);
//!
//! // Either wait for the configured checkpoint...
//! done.await?;
//! // ...or watch the target from elsewhere, e.g. a progress indicator.
//! let progress = target.progress();
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod runtime;

pub use config::{CoordinatorConfig, CONSISTENCY_ENV_VAR};
pub use coordinator::MutationCoordinator;
pub use runtime::TaskRegistry;
