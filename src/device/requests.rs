//! Kernel request pump loop
//!
//! The kernel posts configuration events (MTU change, up/down, MAC,
//! promiscuity) asynchronously; a detached worker pumps them on a fixed
//! cadence, dispatching the callbacks registered at construction. The
//! timed wait on the cancel token is the loop's only suspension point.

use super::KniDevice;
use crate::error::{Error, Result};
use crate::worker::{Worker, WorkerKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

impl KniDevice {
    /// Spawns the detached request worker: wait `sleep`, pump once,
    /// repeat. Fails when a worker is already running.
    pub fn start_request_loop(&mut self, sleep: Duration) -> Result<()> {
        if self.requests.is_some() {
            error!(device = %self.name(), "request worker is already started");
            return Err(Error::InvalidState("request worker is already started"));
        }
        let core = Arc::clone(&self.core);
        let name = format!("kni-requests-{}", self.name());
        let worker = Worker::spawn(WorkerKind::Detached, &name, move |token| {
            debug!(device = %core.name(), "request worker started");
            while !token.wait(sleep) {
                core.handle_requests();
            }
            debug!(device = %core.name(), "request worker stopped");
        })
        .map_err(|err| {
            error!(device = %self.core.name(), %err, "failed to start request worker");
            err
        })?;
        self.requests = Some(worker);
        Ok(())
    }

    /// Cancels and tears down the request worker; the detached thread
    /// exits at its next wakeup.
    pub fn stop_request_loop(&mut self) {
        let Some(worker) = self.requests.take() else {
            debug!(device = %self.name(), "no running request worker to stop");
            return;
        };
        worker.cancel();
    }
}
