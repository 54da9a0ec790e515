//! Background worker threads with cooperative cancellation
//!
//! Worker loops observe cancellation only at their own suspension points
//! (between bursts, or inside a timed wait), never mid-burst, so buffer
//! ownership is never split across a cancellation boundary.

use crate::error::{Error, Result};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Shared stop signal checked by worker loops.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: Mutex::new(false),
                signal: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        *self.inner.cancelled.lock().unwrap() = true;
        self.inner.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock().unwrap()
    }

    /// Sleeps until `timeout` elapses or the token is cancelled.
    /// Returns true when cancelled. No lock is held by the caller across
    /// the wait.
    pub fn wait(&self, timeout: Duration) -> bool {
        let cancelled = self.inner.cancelled.lock().unwrap();
        let (cancelled, _) = self
            .inner
            .signal
            .wait_timeout_while(cancelled, timeout, |cancelled| !*cancelled)
            .unwrap();
        *cancelled
    }
}

/// Thread cleanup discipline, chosen at spawn time.
///
/// Explicit disposition prevents both leaking a joinable handle and
/// joining a detached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// Joined exactly once, on drop.
    Joinable,
    /// Cancelled and abandoned on drop.
    Detached,
}

/// A single long-running thread with cooperative cancellation.
///
/// Spawn failure reports `Error::ThreadSpawn` and allocates nothing, so an
/// invalid worker never exists.
pub struct Worker {
    name: String,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Starts a thread running `entry` with this worker's cancel token.
    pub fn spawn<F>(kind: WorkerKind, name: &str, entry: F) -> Result<Worker>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let token = CancelToken::new();
        let thread_token = token.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || entry(thread_token))
            .map_err(Error::ThreadSpawn)?;
        let handle = match kind {
            WorkerKind::Joinable => Some(handle),
            WorkerKind::Detached => None,
        };
        Ok(Worker {
            name: name.to_string(),
            token,
            handle,
        })
    }

    /// Requests cancellation; the thread observes it at its next
    /// suspension point.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!(worker = %self.name, "worker thread had panicked before join");
            }
        }
    }
}
