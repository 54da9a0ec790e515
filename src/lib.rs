//! knidev - Kernel-NIC-Interface device bridge
//!
//! A KNI device pairs a kernel-visible virtual network interface (usable by
//! ordinary sockets, `ping`, routing, tcpdump) with a user-space endpoint
//! that exchanges raw packet buffers over burst-oriented lockless rings.
//! This crate owns the lifecycle of such a device, moves packets in both
//! directions, services the kernel's out-of-band configuration callbacks,
//! and bridges the interface attributes (link, MAC, MTU, promiscuity)
//! between a cached view and the kernel's authoritative one.
//!
//! The packet engine, buffer pool allocator, and kernel interface control
//! are consumed through narrow traits in [`engine`] and [`iface`]; the
//! included [`iface::LinuxIfaceCtl`] drives the real interface ioctls.

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod iface;
pub mod packet;
pub mod telemetry;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod mock;

pub use device::{
    CaptureOutcome, KniCallbackSet, KniCallbacks, KniDevice, KniDeviceConfig, KniDeviceCore,
    OnPacketArrive,
};
pub use error::{Error, Result};
pub use packet::{Disposition, PacketSlot, RawPacket};
pub use types::{InfoMode, LinkState, MacAddr, PromiscuousMode};
