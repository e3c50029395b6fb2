//! Tandem Core - mutation checkpoint primitives
//!
//! A write applied to two stores is tracked through two checkpoints:
//! `written` (a store accepted it) and `committed` (a store made it durable).
//! This crate provides the pieces those checkpoints are built from and the
//! seams the coordinator in `tandem-mutations` consumes.
//!
//! ## Core Types
//!
//! - [`Latch<T>`]: one-shot, first-wins settlement cell with any number of
//!   observers.
//! - [`MutationRecord<T>`]: the `written`/`committed` latch pair of one write.
//! - [`Consistency`]: which checkpoint a coordinated write waits for.
//!
//! ## Seams
//!
//! - [`TaskSpawner`]: where background work runs. No runtime is assumed here.
//! - [`MutationStore<T>`]: a backend that drives a record's checkpoints.

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Checkpoint kinds and consistency levels
pub mod consistency;

/// One-shot settlement cells
pub mod latch;

/// Written/committed checkpoint pairs
pub mod record;

/// Store interface
pub mod store;

/// Task spawning interface
pub mod task;

pub use consistency::Consistency;
pub use errors::{MutationError, Result, Settlement};
pub use latch::{Latch, LatchFuture, LatchObserver};
pub use record::{CheckpointStatus, MutationProgress, MutationRecord};
pub use store::MutationStore;
pub use task::TaskSpawner;
