//! Packet counters for a KNI device
//!
//! Updated on the burst paths; reads are racy snapshots, which is fine for
//! counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-device packet statistics.
///
/// Counters only move forward; one recording call per burst, not per
/// packet.
#[derive(Debug, Default)]
pub struct DeviceStats {
    rx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    tx_packets: AtomicU64,
    tx_bytes: AtomicU64,
    tx_dropped: AtomicU64,
}

impl DeviceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts one received burst.
    pub(crate) fn record_rx(&self, packets: u64, bytes: u64) {
        self.rx_packets.fetch_add(packets, Ordering::Relaxed);
        self.rx_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Accounts one transmit burst: the accepted prefix and the packets
    /// the engine ring refused.
    pub(crate) fn record_tx(&self, sent: u64, bytes: u64, dropped: u64) {
        self.tx_packets.fetch_add(sent, Ordering::Relaxed);
        self.tx_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.tx_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn rx_packets(&self) -> u64 {
        self.rx_packets.load(Ordering::Relaxed)
    }

    pub fn rx_bytes(&self) -> u64 {
        self.rx_bytes.load(Ordering::Relaxed)
    }

    pub fn tx_packets(&self) -> u64 {
        self.tx_packets.load(Ordering::Relaxed)
    }

    pub fn tx_bytes(&self) -> u64 {
        self.tx_bytes.load(Ordering::Relaxed)
    }

    /// Packets the engine ring refused on transmit.
    pub fn tx_dropped(&self) -> u64 {
        self.tx_dropped.load(Ordering::Relaxed)
    }
}
