//! Packet holders moved across the engine boundary

use crate::engine::Mbuf;
use std::time::SystemTime;

/// Who is responsible for releasing a slot's underlying buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// No buffer attached.
    Empty,
    /// The slot owns the buffer and releases it to the pool on drop.
    Owned,
    /// The buffer was handed off on transmit; the engine releases it.
    LentToEngine,
}

/// User-side holder of one engine buffer.
///
/// A slot records the ownership disposition of its buffer and the timestamp
/// of the burst that produced it. After a partial transmit, slots in the
/// accepted prefix read `LentToEngine` while the rest stay `Owned`.
#[derive(Debug, Default)]
pub struct PacketSlot {
    mbuf: Option<Mbuf>,
    lent: bool,
    timestamp: Option<SystemTime>,
}

impl PacketSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `mbuf`, releasing any previously owned buffer.
    pub fn attach(&mut self, mbuf: Mbuf, timestamp: SystemTime) {
        self.mbuf = Some(mbuf);
        self.lent = false;
        self.timestamp = Some(timestamp);
    }

    /// Takes the buffer out, leaving the slot empty.
    pub fn detach(&mut self) -> Option<Mbuf> {
        self.mbuf.take()
    }

    /// Puts back a buffer taken by `detach`, keeping the slot's timestamp.
    pub(crate) fn restore(&mut self, mbuf: Mbuf) {
        self.mbuf = Some(mbuf);
        self.lent = false;
    }

    /// Records that the engine took the (already detached) buffer.
    pub(crate) fn mark_lent(&mut self) {
        self.lent = true;
    }

    pub fn disposition(&self) -> Disposition {
        if self.mbuf.is_some() {
            Disposition::Owned
        } else if self.lent {
            Disposition::LentToEngine
        } else {
            Disposition::Empty
        }
    }

    /// True while this slot must release the buffer itself.
    pub fn owns_buffer(&self) -> bool {
        self.mbuf.is_some()
    }

    /// Payload bytes, or empty when no buffer is attached.
    pub fn data(&self) -> &[u8] {
        self.mbuf.as_ref().map(Mbuf::data).unwrap_or(&[])
    }

    /// Timestamp of the burst that filled this slot.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }
}

/// A packet outside the engine's buffer domain.
///
/// Transmitting one costs a conversion into a pool-drawn engine buffer.
#[derive(Debug, Clone)]
pub struct RawPacket {
    data: Vec<u8>,
    timestamp: SystemTime,
}

impl RawPacket {
    pub fn new(data: Vec<u8>, timestamp: SystemTime) -> Self {
        Self { data, timestamp }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}
