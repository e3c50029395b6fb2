//! Tandem Testing Infrastructure
//!
//! Scripted stores, an invocation log and tracing setup shared by the
//! coordinator's tests.
//!
//! # Usage
//!
//! Add this to your crate's `Cargo.toml` dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! tandem-testkit = { path = "../tandem-testkit" }
//! ```
//!
//! Then in your tests:
//! ```rust,ignore
//! use tandem_testkit::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn my_test() {
//!     init_test_tracing();
//!     let log = InvocationLog::new();
//!     let remote = SimulatedStore::new("remote", "A")
//!         .written_after(Duration::from_millis(10))
//!         .with_log(log.clone())
//!         .shared();
//!     // ... hand `remote` to a coordinator
//! }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod invocations;
pub mod store;

pub use invocations::{InvocationEvent, InvocationKind, InvocationLog};
pub use store::{store_procedure, ScriptedFailure, SimulatedStore};

use std::time::Duration;

use tandem_core::{Latch, Settlement};
use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`, defaulting to `warn`. Safe to call from every test.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Settle `latch` with `outcome` after `delay`, on a spawned task.
pub fn settle_after<T>(latch: &Latch<T>, delay: Duration, outcome: Settlement<T>)
where
    T: Clone + Send + 'static,
{
    let latch = latch.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        latch.settle(outcome);
    });
}

/// Milliseconds as a `Duration`.
pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
