//! Single-assignment result cell shared between a waiting caller and the
//! read loop that eventually produces the result.
//!
//! A [`Promise`] settles at most once (resolved or failed). Late settlement
//! attempts are silently ignored and cannot corrupt an already delivered
//! result. Callers may block on [`Promise::wait`] with a timeout, register
//! one continuation with [`Promise::on_settled`], or both; a continuation
//! registered after settlement fires immediately on the caller's task.
//!
//! Settlement and continuation registration are mutually exclusive under
//! one lock per promise; the continuation itself always runs unlocked, so
//! it may safely touch this or other promises.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{BeelineError, Result};

type Continuation<T> = Box<dyn FnOnce(Result<T>) + Send>;

enum State<T> {
    Pending { continuation: Option<Continuation<T>> },
    Settled(Result<T>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    settled_tx: watch::Sender<bool>,
}

/// A single-assignment, thread-safe result container.
///
/// Cheaply cloneable; all clones observe the same settlement.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise<T> {
    /// Create a new pending promise.
    pub fn new() -> Self {
        let (settled_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending { continuation: None }),
                settled_tx,
            }),
        }
    }

    /// Check whether the promise has been resolved or failed.
    pub fn is_settled(&self) -> bool {
        matches!(*self.lock(), State::Settled(_))
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Promise<T> {
    /// Settle as success. A no-op if the promise is already settled.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Settle as failure. A no-op if the promise is already settled.
    pub fn fail(&self, error: BeelineError) {
        self.settle(Err(error));
    }

    fn settle(&self, result: Result<T>) {
        let continuation = {
            let mut state = self.lock();
            let slot = match &mut *state {
                State::Settled(_) => return,
                State::Pending { continuation } => continuation.take(),
            };
            *state = State::Settled(result.clone());
            slot
        };
        // Wake waiters only after the state is visible.
        self.shared.settled_tx.send_replace(true);
        // Continuation runs outside the lock so it may register on this or
        // other promises without deadlocking.
        if let Some(continuation) = continuation {
            continuation(result);
        }
    }

    /// Register the continuation to run at settlement.
    ///
    /// At most one continuation is supported; a second registration
    /// replaces the first. If the promise is already settled, the
    /// continuation fires immediately on the calling task.
    pub fn on_settled(&self, continuation: impl FnOnce(Result<T>) + Send + 'static) {
        let mut continuation = Some(Box::new(continuation) as Continuation<T>);
        let fire = {
            let mut state = self.lock();
            match &mut *state {
                State::Settled(result) => Some(result.clone()),
                State::Pending { continuation: slot } => {
                    *slot = continuation.take();
                    None
                }
            }
        };
        if let (Some(result), Some(continuation)) = (fire, continuation.take()) {
            continuation(result);
        }
    }

    /// Wait until the promise settles or `timeout` elapses.
    ///
    /// On timeout, returns [`BeelineError::Timeout`] without altering the
    /// promise state: a late settlement is still legal and is observed by
    /// other waiters and by the registered continuation.
    pub async fn wait(&self, timeout: Duration) -> Result<T> {
        match tokio::time::timeout(timeout, self.wait_settled()).await {
            Ok(result) => result,
            Err(_) => Err(BeelineError::Timeout),
        }
    }

    async fn wait_settled(&self) -> Result<T> {
        let mut rx = self.shared.settled_tx.subscribe();
        loop {
            if let State::Settled(result) = &*self.lock() {
                return result.clone();
            }
            if rx.changed().await.is_err() {
                // The sender lives inside our own shared state, so this
                // cannot happen while any handle exists.
                return Err(BeelineError::ConnectionClosed);
            }
        }
    }

    /// Get the settled result without waiting, if available.
    pub fn try_result(&self) -> Option<Result<T>> {
        match &*self.lock() {
            State::Settled(result) => Some(result.clone()),
            State::Pending { .. } => None,
        }
    }
}
