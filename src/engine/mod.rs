//! Kernel-bypass engine seam
//!
//! The device core talks to the packet engine only through the narrow
//! primitive set below, so different engine bindings (and the test engine)
//! can sit behind the same trait.

mod pool;

pub use pool::{BufferPool, Mbuf, PoolAllocator};

use crate::types::{LinkState, MacAddr};
use std::sync::Arc;

/// Upper bound on buffers moved by one ring operation.
pub const MAX_BURST: usize = 64;

/// Backing size of the buffers drawn for device pools.
pub const MBUF_DATA_SIZE: usize = 2048;

/// Per-core cache size requested when creating device pools.
pub const MEMPOOL_CACHE_SIZE: usize = 256;

/// "Any NUMA socket" marker passed to pool creation.
pub const SOCKET_ID_ANY: i32 = -1;

/// Features the target engine version exposes, detected once at
/// handle-creation time. Operations behind an absent capability report
/// `NotSupported` and are otherwise no-ops.
#[derive(Debug, Clone, Copy)]
pub struct EngineCapabilities {
    /// Engine-side link updates (`update_link`) are available.
    pub link_update: bool,
    /// MAC-address and promiscuity callbacks are dispatched.
    pub extended_callbacks: bool,
    /// Initial MAC and MTU can be handed to the kernel at allocation.
    pub mac_mtu_conf: bool,
}

/// Kernel-side configuration for one KNI allocation.
#[derive(Debug, Clone)]
pub struct KniConf {
    /// Kernel interface name.
    pub name: String,
    /// CPU core hint for the kernel-side thread.
    pub core_id: u32,
    /// Pin the kernel-side thread to `core_id`.
    pub force_bind: bool,
    /// Buffer size the device pool was created with.
    pub mbuf_size: usize,
    /// Initial MAC; `None` leaves assignment to the engine.
    pub mac: Option<MacAddr>,
    /// Initial MTU.
    pub mtu: u16,
}

pub type ChangeMtuCallback = Box<dyn Fn(u16, u16) -> i32 + Send + Sync>;
pub type ConfigNetworkIfCallback = Box<dyn Fn(u16, bool) -> i32 + Send + Sync>;
pub type ConfigMacCallback = Box<dyn Fn(u16, MacAddr) -> i32 + Send + Sync>;
pub type ConfigPromiscCallback = Box<dyn Fn(u16, bool) -> i32 + Send + Sync>;

/// Out-of-band configuration handlers the engine dispatches from the
/// request pump, plus the port id reported to them.
#[derive(Default)]
pub struct KniOps {
    pub port_id: u16,
    pub change_mtu: Option<ChangeMtuCallback>,
    pub config_network_if: Option<ConfigNetworkIfCallback>,
    pub config_mac_address: Option<ConfigMacCallback>,
    pub config_promiscuity: Option<ConfigPromiscCallback>,
}

/// Opaque engine handle for one allocated KNI device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KniHandle(pub u64);

/// The burst-oriented KNI primitive set.
pub trait KniEngine: Send + Sync {
    fn capabilities(&self) -> EngineCapabilities;

    /// Allocates a KNI device backed by `pool`.
    fn alloc(&self, pool: Arc<dyn BufferPool>, conf: &KniConf, ops: KniOps) -> Option<KniHandle>;

    /// Releases an allocated device. False when the engine reports failure.
    fn release(&self, handle: KniHandle) -> bool;

    /// Non-blocking burst receive of up to `cap` buffers, in ring order.
    /// Ownership of the returned buffers passes to the caller.
    fn rx_burst(&self, handle: KniHandle, cap: usize) -> Vec<Mbuf>;

    /// Enqueues a prefix of `bufs` for transmission and returns its length.
    /// Accepted buffers are drained from the front of `bufs` (the engine
    /// frees them after transmit); rejected buffers stay with the caller.
    fn tx_burst(&self, handle: KniHandle, bufs: &mut Vec<Mbuf>) -> usize;

    /// Pumps pending kernel configuration requests, dispatching the
    /// callbacks registered at allocation. False on engine failure.
    fn handle_request(&self, handle: KniHandle) -> bool;

    /// Informs the engine side that the link changed. Returns the previous
    /// state, or `NotSupported`/`Error`.
    fn update_link(&self, handle: KniHandle, state: LinkState) -> LinkState;
}
