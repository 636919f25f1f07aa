//! Single-assignment handle for the result of an asynchronous operation.
//!
//! A [`Task`] starts `Pending` and moves exactly once to `Succeeded`, `Failed` or
//! `Cancelled`. The first completion attempt wins; later attempts are ignored.
//! Handles are cheap to clone and can be observed, awaited or cancelled from any thread.

use crate::error::{AppError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;

/// Terminal outcome of a task.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Succeeded(T),
    Failed(AppError),
    Cancelled,
}

impl<T> Outcome<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Self::Succeeded(v) => Ok(v),
            Self::Failed(e) => Err(e),
            Self::Cancelled => Err(AppError::Cancelled),
        }
    }

    fn state(&self) -> TaskState {
        match self {
            Self::Succeeded(_) => TaskState::Succeeded,
            Self::Failed(_) => TaskState::Failed,
            Self::Cancelled => TaskState::Cancelled,
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(v) => Self::Succeeded(v),
            Err(AppError::Cancelled) => Self::Cancelled,
            Err(e) => Self::Failed(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;

struct Shared<T> {
    outcome: OnceLock<Outcome<T>>,
    // `None` once the task is terminal; guards the transition so callbacks are never lost.
    callbacks: Mutex<Option<Vec<Callback<T>>>>,
    finished: Condvar,
    terminal_tx: watch::Sender<bool>,
    cancel_tx: watch::Sender<bool>,
}

impl<T> Shared<T> {
    fn new() -> Self {
        let (terminal_tx, _) = watch::channel(false);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            outcome: OnceLock::new(),
            callbacks: Mutex::new(Some(Vec::new())),
            finished: Condvar::new(),
            terminal_tx,
            cancel_tx,
        }
    }

    fn complete(&self, outcome: Outcome<T>) -> bool {
        let callbacks = {
            let mut guard = self.callbacks.lock();
            if guard.is_none() || self.outcome.set(outcome).is_err() {
                return false;
            }
            guard.take().unwrap_or_default()
        };

        self.finished.notify_all();
        self.terminal_tx.send_replace(true);

        if let Some(outcome) = self.outcome.get() {
            for callback in callbacks {
                callback(outcome);
            }
        }
        true
    }
}

/// Handle to an eventually available result of type `T`.
pub struct Task<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("state", &self.state()).finish()
    }
}

impl<T: Send + Sync + 'static> Task<T> {
    /// Creates a pending task together with the completer that resolves it.
    #[must_use]
    pub fn pending() -> (Self, TaskCompleter<T>) {
        let shared = Arc::new(Shared::new());
        (Self { shared: Arc::clone(&shared) }, TaskCompleter { shared })
    }

    /// Runs `future` on `runtime` and resolves the task with its result.
    ///
    /// Cancellation is cooperative: once [`Task::cancel`] is called the future is
    /// dropped at its next await point and the task resolves as `Cancelled`.
    pub fn spawn<F>(runtime: &Handle, future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (task, completer) = Self::pending();
        runtime.spawn(async move {
            tokio::select! {
                biased;
                () = completer.cancelled() => {
                    tracing::debug!("Task cancelled before completion");
                    completer.cancel();
                }
                result = future => {
                    completer.complete(result);
                }
            }
        });
        task
    }
}

impl<T> Task<T> {
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.shared.outcome.get().map_or(TaskState::Pending, Outcome::state)
    }

    /// Registers `callback` to run once with the terminal outcome.
    ///
    /// If the task is already terminal the callback runs immediately on the calling
    /// thread; otherwise it runs on whichever thread completes the task.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        {
            let mut guard = self.shared.callbacks.lock();
            if let Some(callbacks) = guard.as_mut() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        if let Some(outcome) = self.shared.outcome.get() {
            callback(outcome);
        }
    }

    /// Requests cancellation. Returns `false` if the task was already terminal.
    ///
    /// Cancellation is advisory: an operation that cannot stop may still succeed or fail.
    pub fn cancel(&self) -> bool {
        if self.shared.outcome.get().is_some() {
            return false;
        }
        self.shared.cancel_tx.send_replace(true);
        true
    }
}

impl<T: Clone> Task<T> {
    /// Returns the outcome if the task is terminal.
    #[must_use]
    pub fn peek(&self) -> Option<Outcome<T>> {
        self.shared.outcome.get().cloned()
    }

    /// Waits asynchronously for the terminal outcome.
    pub async fn outcome(&self) -> Outcome<T> {
        let mut rx = self.shared.terminal_tx.subscribe();
        // The sender lives in `shared`, which `self` keeps alive.
        let _ = rx.wait_for(|done| *done).await;
        self.shared.outcome.get().cloned().unwrap_or(Outcome::Cancelled)
    }

    /// Blocks the calling thread until the task is terminal.
    ///
    /// A terminal task returns its outcome right away, on any thread.
    ///
    /// # Errors
    /// Returns the task's failure, `AppError::Cancelled`, or
    /// `AppError::BlockingWaitOnRuntime` when a pending task is waited on from a
    /// current-thread runtime, where blocking would stall the thread that has to
    /// drive completion.
    pub fn wait(&self) -> Result<T> {
        if let Some(outcome) = self.peek() {
            return outcome.into_result();
        }
        Self::blocking(|| self.wait_inner(None)).and_then(|o| o.map_or(Err(AppError::Cancelled), Outcome::into_result))
    }

    /// Like [`Task::wait`], giving up after `timeout`. Returns `None` on timeout.
    ///
    /// # Errors
    /// Same as [`Task::wait`].
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        if let Some(outcome) = self.peek() {
            return Some(outcome.into_result());
        }
        match Self::blocking(|| self.wait_inner(Some(timeout))) {
            Ok(Some(outcome)) => Some(outcome.into_result()),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }

    fn blocking<R>(f: impl FnOnce() -> R) -> Result<R> {
        match Handle::try_current().map(|h| h.runtime_flavor()) {
            Err(_) => Ok(f()),
            Ok(RuntimeFlavor::MultiThread) => Ok(tokio::task::block_in_place(f)),
            Ok(_) => Err(AppError::BlockingWaitOnRuntime),
        }
    }

    fn wait_inner(&self, timeout: Option<Duration>) -> Option<Outcome<T>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.shared.callbacks.lock();
        while guard.is_some() {
            match deadline {
                Some(deadline) => {
                    if self.shared.finished.wait_until(&mut guard, deadline).timed_out() && guard.is_some() {
                        return None;
                    }
                }
                None => self.shared.finished.wait(&mut guard),
            }
        }
        drop(guard);
        self.shared.outcome.get().cloned()
    }
}

/// Write side of a [`Task`]. Dropping it without completing resolves the task as `Cancelled`.
pub struct TaskCompleter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> fmt::Debug for TaskCompleter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCompleter").field("terminal", &self.shared.outcome.get().is_some()).finish()
    }
}

impl<T> TaskCompleter<T> {
    /// Resolves the task. Returns `false` if it was already terminal.
    pub fn finish(&self, outcome: Outcome<T>) -> bool {
        self.shared.complete(outcome)
    }

    pub fn complete(&self, result: Result<T>) -> bool {
        self.finish(result.into())
    }

    pub fn succeed(&self, value: T) -> bool {
        self.finish(Outcome::Succeeded(value))
    }

    pub fn fail(&self, error: AppError) -> bool {
        self.finish(Outcome::Failed(error))
    }

    pub fn cancel(&self) -> bool {
        self.finish(Outcome::Cancelled)
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        *self.shared.cancel_tx.borrow()
    }

    /// Resolves once cancellation has been requested on the task.
    pub async fn cancelled(&self) {
        let mut rx = self.shared.cancel_tx.subscribe();
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl<T> Drop for TaskCompleter<T> {
    fn drop(&mut self) {
        if self.shared.outcome.get().is_none() && self.shared.complete(Outcome::Cancelled) {
            tracing::warn!("Task completer dropped before completion, resolving as cancelled");
        }
    }
}
