//! Latch<T> - a one-shot settlement cell with any number of observers
//!
//! A latch starts pending and settles exactly once, to a value or to a
//! [`MutationError`]. Settlement is first-wins: later `resolve`/`reject` calls
//! are no-ops, so several producers may race to settle the same latch without
//! external locking.
//!
//! Observers either register a continuation with [`Latch::on_settle`] or await
//! a [`LatchFuture`] from [`Latch::get`]. Both see the same terminal outcome no
//! matter whether they registered before or after settlement.
//!
//! # Runtime Agnostic Design
//!
//! Only `parking_lot` and `futures::channel::oneshot` are used, so latches work
//! under any executor. Continuations run on the thread that settles the latch,
//! after the internal lock has been released.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::errors::{MutationError, Settlement};

type Continuation<T> = Box<dyn FnOnce(Settlement<T>) + Send>;

enum LatchState<T> {
    /// Not yet settled; observers waiting for the outcome.
    Pending(Waiters<T>),
    /// Terminal outcome. Never replaced once set.
    Settled(Settlement<T>),
}

/// Observers of a pending latch.
///
/// Futures from [`Latch::get`] are kept apart from continuations so that
/// senders whose receiver was dropped can be pruned while still pending.
struct Waiters<T> {
    continuations: Vec<Continuation<T>>,
    senders: Vec<oneshot::Sender<Settlement<T>>>,
}

impl<T> Waiters<T> {
    fn new() -> Self {
        Self {
            continuations: Vec::new(),
            senders: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.continuations.len() + self.senders.len()
    }

    fn notify(self, outcome: &Settlement<T>)
    where
        T: Clone,
    {
        for continuation in self.continuations {
            continuation(outcome.clone());
        }
        for tx in self.senders {
            // receiver may be gone
            let _ = tx.send(outcome.clone());
        }
    }
}

/// A one-shot, multi-observer settlement cell.
///
/// Cloning a `Latch` yields another handle to the same cell. Any handle may
/// settle it; use [`Latch::observer`] to hand out a handle that can only read.
///
/// # Example
///
/// ```rust,ignore
/// use tandem_core::Latch;
///
/// let latch = Latch::new();
/// let early = latch.get();
///
/// assert!(latch.resolve(7));
/// assert!(!latch.resolve(8)); // first settlement wins
///
/// assert_eq!(early.await, Ok(7));
/// assert_eq!(latch.get().await, Ok(7));
/// ```
pub struct Latch<T> {
    inner: Arc<Mutex<LatchState<T>>>,
}

impl<T: Clone + Send + 'static> Latch<T> {
    /// Create a pending latch.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LatchState::Pending(Waiters::new()))),
        }
    }

    /// Settle to fulfilled with `value`.
    ///
    /// Returns `false` and leaves the stored outcome untouched if the latch
    /// was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle to rejected with `error`.
    ///
    /// Returns `false` and leaves the stored outcome untouched if the latch
    /// was already settled.
    pub fn reject(&self, error: MutationError) -> bool {
        self.settle(Err(error))
    }

    /// Settle with an arbitrary outcome. First settlement wins.
    pub fn settle(&self, outcome: Settlement<T>) -> bool {
        let waiters = {
            let mut state = self.inner.lock();
            let waiters = match &mut *state {
                LatchState::Pending(waiters) => std::mem::replace(waiters, Waiters::new()),
                LatchState::Settled(_) => return false,
            };
            *state = LatchState::Settled(outcome.clone());
            waiters
        };

        waiters.notify(&outcome);
        true
    }

    /// Register a continuation that receives the terminal outcome exactly once.
    ///
    /// Runs immediately on the calling thread if the latch is already settled,
    /// otherwise on the thread that settles it.
    pub fn on_settle<F>(&self, f: F)
    where
        F: FnOnce(Settlement<T>) + Send + 'static,
    {
        let settled = {
            let mut state = self.inner.lock();
            match &mut *state {
                LatchState::Pending(waiters) => {
                    waiters.continuations.push(Box::new(f));
                    return;
                }
                LatchState::Settled(outcome) => outcome.clone(),
            }
        };
        f(settled);
    }

    /// Get an independent future for the terminal outcome.
    ///
    /// The observer is registered when this is called, not when the future is
    /// first polled, so a future obtained before settlement still observes it.
    /// Futures dropped before settlement are forgotten on the next call.
    pub fn get(&self) -> LatchFuture<T> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.lock();
        match &mut *state {
            LatchState::Pending(waiters) => {
                waiters.senders.retain(|sender| !sender.is_canceled());
                waiters.senders.push(tx);
            }
            LatchState::Settled(outcome) => {
                let _ = tx.send(outcome.clone());
            }
        }
        LatchFuture { rx }
    }

    /// The terminal outcome, if settled.
    pub fn outcome(&self) -> Option<Settlement<T>> {
        match &*self.inner.lock() {
            LatchState::Pending(_) => None,
            LatchState::Settled(outcome) => Some(outcome.clone()),
        }
    }

    /// Whether the latch has settled.
    pub fn is_settled(&self) -> bool {
        matches!(&*self.inner.lock(), LatchState::Settled(_))
    }

    /// Number of observers still waiting; zero once settled.
    pub fn waiter_count(&self) -> usize {
        match &*self.inner.lock() {
            LatchState::Pending(waiters) => waiters.len(),
            LatchState::Settled(_) => 0,
        }
    }

    /// A handle that can observe but never settle this latch.
    pub fn observer(&self) -> LatchObserver<T> {
        LatchObserver {
            latch: self.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Latch<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Latch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.lock() {
            LatchState::Pending(waiters) => f
                .debug_struct("Latch")
                .field("state", &"pending")
                .field("waiters", &waiters.len())
                .finish(),
            LatchState::Settled(outcome) => f
                .debug_struct("Latch")
                .field("state", &"settled")
                .field("outcome", outcome)
                .finish(),
        }
    }
}

/// Read-only view of a [`Latch`].
#[derive(Clone, Debug)]
pub struct LatchObserver<T> {
    latch: Latch<T>,
}

impl<T: Clone + Send + 'static> LatchObserver<T> {
    /// See [`Latch::get`].
    pub fn get(&self) -> LatchFuture<T> {
        self.latch.get()
    }

    /// See [`Latch::on_settle`].
    pub fn on_settle<F>(&self, f: F)
    where
        F: FnOnce(Settlement<T>) + Send + 'static,
    {
        self.latch.on_settle(f);
    }

    /// See [`Latch::outcome`].
    pub fn outcome(&self) -> Option<Settlement<T>> {
        self.latch.outcome()
    }

    /// See [`Latch::is_settled`].
    pub fn is_settled(&self) -> bool {
        self.latch.is_settled()
    }
}

/// Future returned by [`Latch::get`].
///
/// Resolves to the latch's terminal outcome, or to
/// [`MutationError::Abandoned`] if every handle to the latch is dropped while
/// it is still pending.
#[must_use = "futures do nothing unless polled"]
#[derive(Debug)]
pub struct LatchFuture<T> {
    rx: oneshot::Receiver<Settlement<T>>,
}

impl<T> Future for LatchFuture<T> {
    type Output = Settlement<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(MutationError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
