//! Burst packet I/O
//!
//! Receive hands engine buffers to user-side slots; transmit hands them
//! back. On a partial transmit the engine owns the accepted prefix and the
//! caller keeps the rest, recorded per slot as its disposition.

use super::KniDeviceCore;
use crate::engine::{Mbuf, MAX_BURST};
use crate::error::{Error, Result};
use crate::packet::{PacketSlot, RawPacket};
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use tracing::error;

impl KniDeviceCore {
    fn ensure_opened(&self) -> Result<()> {
        if !self.opened.load(Ordering::SeqCst) {
            error!(device = %self.name(), "device is not opened");
            return Err(Error::InvalidState("device is not opened"));
        }
        Ok(())
    }

    fn ensure_rx_allowed(&self) -> Result<()> {
        self.ensure_opened()?;
        if self.capturing.load(Ordering::SeqCst) {
            error!(
                device = %self.name(),
                "capture mode is currently running; cannot receive packets in parallel"
            );
            return Err(Error::InvalidState("capture mode is running"));
        }
        Ok(())
    }

    pub(crate) fn note_rx(&self, mbufs: &[Mbuf]) {
        let bytes: u64 = mbufs.iter().map(|m| m.len() as u64).sum();
        self.stats.record_rx(mbufs.len() as u64, bytes);
    }

    fn note_tx(&self, sent_bytes: u64, sent: usize, total: usize) {
        self.stats
            .record_tx(sent as u64, sent_bytes, (total - sent) as u64);
    }

    /// Burst-receives into fresh slots appended to `out`.
    ///
    /// At most [`MAX_BURST`] packets per call; all slots of one burst share
    /// one timestamp. Zero received is not an error.
    pub fn receive(&self, out: &mut Vec<PacketSlot>) -> Result<usize> {
        self.ensure_rx_allowed()?;
        let mbufs = self.engine.rx_burst(self.handle, MAX_BURST);
        if mbufs.is_empty() {
            return Ok(0);
        }
        let timestamp = SystemTime::now();
        let count = mbufs.len();
        self.note_rx(&mbufs);
        for mbuf in mbufs {
            let mut slot = PacketSlot::new();
            slot.attach(mbuf, timestamp);
            out.push(slot);
        }
        Ok(count)
    }

    /// Burst-receives into a caller-provided holder array.
    ///
    /// An existing slot is reused (its previous buffer is released back to
    /// the pool); an empty holder is filled with a fresh slot. At most
    /// `min(holders.len(), MAX_BURST)` packets are requested from the
    /// engine, so the array is never overrun.
    pub fn receive_into(&self, holders: &mut [Option<PacketSlot>]) -> Result<usize> {
        self.ensure_rx_allowed()?;
        let cap = holders.len().min(MAX_BURST);
        let mbufs = self.engine.rx_burst(self.handle, cap);
        if mbufs.is_empty() {
            return Ok(0);
        }
        let timestamp = SystemTime::now();
        let count = mbufs.len();
        self.note_rx(&mbufs);
        for (holder, mbuf) in holders.iter_mut().zip(mbufs) {
            holder
                .get_or_insert_with(PacketSlot::new)
                .attach(mbuf, timestamp);
        }
        Ok(count)
    }

    /// Burst-transmits engine-native slots and returns the number the
    /// engine accepted.
    ///
    /// Slots at indices below the returned count hand their buffer off to
    /// the engine, which releases it after transmission; the remaining
    /// slots keep ownership.
    pub fn send(&self, slots: &mut [PacketSlot]) -> Result<usize> {
        self.ensure_opened()?;
        if let Some(index) = slots.iter().position(|slot| !slot.owns_buffer()) {
            error!(device = %self.name(), index, "send burst contains a slot without a buffer");
            return Err(Error::InvalidArgument(
                "send burst contains an empty slot".to_string(),
            ));
        }
        let mut mbufs: Vec<Mbuf> = slots.iter_mut().filter_map(PacketSlot::detach).collect();
        let total = mbufs.len();
        let lens: Vec<u64> = mbufs.iter().map(|m| m.len() as u64).collect();

        let sent = self.engine.tx_burst(self.handle, &mut mbufs);

        // mbufs now holds the rejected suffix; give those back
        for (slot, mbuf) in slots[sent..].iter_mut().zip(mbufs.drain(..)) {
            slot.restore(mbuf);
        }
        for slot in &mut slots[..sent] {
            slot.mark_lent();
        }
        self.note_tx(lens[..sent].iter().sum(), sent, total);
        Ok(sent)
    }

    /// Converts foreign packets into engine buffers drawn from the device
    /// pool and burst-transmits them.
    ///
    /// Every conversion is released on return: the accepted prefix by the
    /// engine after transmission, the rest back to the pool here. A failed
    /// conversion releases the ones already made and fails the call.
    pub fn send_raw(&self, packets: &[RawPacket]) -> Result<usize> {
        self.ensure_opened()?;
        let mut mbufs = Vec::with_capacity(packets.len());
        for packet in packets {
            match Mbuf::from_payload(&self.pool, packet.data()) {
                Some(mbuf) => mbufs.push(mbuf),
                None => {
                    error!(
                        device = %self.name(),
                        len = packet.len(),
                        "failed to convert packet into an engine buffer"
                    );
                    return Err(Error::PoolAllocFailed {
                        name: self.pool.name().to_string(),
                    });
                }
            }
        }
        let total = mbufs.len();
        let lens: Vec<u64> = mbufs.iter().map(|m| m.len() as u64).collect();

        let sent = self.engine.tx_burst(self.handle, &mut mbufs);

        drop(mbufs); // rejected conversions go back to the pool
        self.note_tx(lens[..sent].iter().sum(), sent, total);
        Ok(sent)
    }

    /// Transmits one engine-native packet. True when it was handed off.
    pub fn send_packet(&self, slot: &mut PacketSlot) -> Result<bool> {
        Ok(self.send(std::slice::from_mut(slot))? == 1)
    }

    /// Converts and transmits one foreign packet. True when it was handed
    /// off.
    pub fn send_raw_packet(&self, packet: &RawPacket) -> Result<bool> {
        Ok(self.send_raw(std::slice::from_ref(packet))? == 1)
    }
}
