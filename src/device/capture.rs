//! Packet capture
//!
//! Two modes: a background worker that polls the receive ring and invokes
//! a user callback, and a blocking variant with a deadline. Cancellation is
//! observed only between bursts so buffer ownership is never split across
//! a cancellation boundary.

use super::{KniDevice, KniDeviceCore};
use crate::engine::MAX_BURST;
use crate::error::{Error, Result};
use crate::packet::PacketSlot;
use crate::worker::{Worker, WorkerKind};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error};

/// Packet-arrival callback: the burst's slots and the device core.
/// Return false to stop capturing.
pub type OnPacketArrive = Box<dyn FnMut(&mut [PacketSlot], &KniDeviceCore) -> bool + Send>;

/// How a blocking capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The callback returned false.
    CallbackStopped,
    /// The deadline expired without a stop from the callback.
    TimedOut,
}

fn run_capture(core: &Arc<KniDeviceCore>, on_packet: &mut OnPacketArrive) -> bool {
    let mbufs = core.engine.rx_burst(core.handle, MAX_BURST);
    if mbufs.is_empty() {
        return true;
    }
    let timestamp = SystemTime::now();
    core.note_rx(&mbufs);
    let mut slots: Vec<PacketSlot> = Vec::with_capacity(mbufs.len());
    for mbuf in mbufs {
        let mut slot = PacketSlot::new();
        slot.attach(mbuf, timestamp);
        slots.push(slot);
    }
    on_packet(&mut slots, core)
}

impl KniDevice {
    /// Starts the background capture worker.
    ///
    /// While it runs, direct receive calls on this device fail. The worker
    /// exits when [`stop_capture`](KniDevice::stop_capture) cancels it or
    /// the callback returns false.
    pub fn start_capture(&mut self, mut on_packet: OnPacketArrive) -> Result<()> {
        if !self.core.opened.load(Ordering::SeqCst) {
            error!(device = %self.core.name(), "device is not opened; cannot start capture");
            return Err(Error::InvalidState("device is not opened"));
        }
        if self.capture.is_some() {
            error!(device = %self.core.name(), "device is already capturing");
            return Err(Error::InvalidState("device is already capturing"));
        }

        self.core.capturing.store(true, Ordering::SeqCst);
        let core = Arc::clone(&self.core);
        let name = format!("kni-capture-{}", self.core.name());
        let worker = Worker::spawn(WorkerKind::Joinable, &name, move |token| {
            debug!(device = %core.name(), "capture worker started");
            loop {
                if !run_capture(&core, &mut on_packet) {
                    break;
                }
                // sole cancellation point: between bursts
                if token.is_cancelled() {
                    break;
                }
            }
            core.capturing.store(false, Ordering::SeqCst);
            debug!(device = %core.name(), "capture worker stopped");
        });
        match worker {
            Ok(worker) => {
                self.capture = Some(worker);
                Ok(())
            }
            Err(err) => {
                self.core.capturing.store(false, Ordering::SeqCst);
                error!(device = %self.core.name(), %err, "failed to start capture worker");
                Err(err)
            }
        }
    }

    /// Cancels and joins the capture worker. Safe to call when no capture
    /// is running.
    pub fn stop_capture(&mut self) {
        let Some(worker) = self.capture.take() else {
            debug!(device = %self.core.name(), "no running capture worker to stop");
            return;
        };
        worker.cancel();
        drop(worker); // joins
        self.core.capturing.store(false, Ordering::SeqCst);
    }

    /// Captures on the calling thread until the callback stops it or the
    /// deadline expires. `None` means no deadline: the callback is the
    /// only exit.
    pub fn capture_blocking(
        &mut self,
        mut on_packet: OnPacketArrive,
        timeout: Option<Duration>,
    ) -> Result<CaptureOutcome> {
        if !self.core.opened.load(Ordering::SeqCst) {
            error!(device = %self.core.name(), "device is not opened; cannot start capture");
            return Err(Error::InvalidState("device is not opened"));
        }
        if self.capture.is_some() {
            error!(device = %self.core.name(), "device is already capturing");
            return Err(Error::InvalidState("device is already capturing"));
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(deadline) = deadline {
                if Instant::now() > deadline {
                    return Ok(CaptureOutcome::TimedOut);
                }
            }
            if !run_capture(&self.core, &mut on_packet) {
                return Ok(CaptureOutcome::CallbackStopped);
            }
        }
    }
}
