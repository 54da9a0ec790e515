//! KNI device lifecycle and attribute bridge
//!
//! A KNI device pairs a kernel-visible virtual interface with a user-space
//! ring endpoint. This module owns construction and teardown, the cached
//! view of the kernel-visible attributes, and the composition of the packet
//! I/O, capture, and request-pump surfaces.

mod capture;
mod io;
mod requests;

pub use capture::{CaptureOutcome, OnPacketArrive};

use crate::engine::{
    BufferPool, ChangeMtuCallback, ConfigMacCallback, ConfigNetworkIfCallback,
    ConfigPromiscCallback, EngineCapabilities, KniConf, KniEngine, KniHandle, KniOps,
    PoolAllocator, MBUF_DATA_SIZE, MEMPOOL_CACHE_SIZE, SOCKET_ID_ANY,
};
use crate::error::{Error, Result};
use crate::iface::KernelIfaceCtl;
use crate::telemetry::DeviceStats;
use crate::types::{InfoMode, LinkState, MacAddr, PromiscuousMode};
use crate::worker::Worker;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// Prefix of per-device pool names; the caller-supplied tag makes each
/// pool name unique across live devices in one process.
const POOL_NAME_PREFIX: &str = "kniMempool";

/// Extended kernel-callback set understood by current engine versions.
#[derive(Default)]
pub struct KniCallbackSet {
    pub change_mtu: Option<ChangeMtuCallback>,
    pub config_network_if: Option<ConfigNetworkIfCallback>,
    pub config_mac_address: Option<ConfigMacCallback>,
    pub config_promiscuity: Option<ConfigPromiscCallback>,
}

/// Callback forms across engine versions; exactly one is active per device.
pub enum KniCallbacks {
    /// Engines with the extended callback capability.
    Full(KniCallbackSet),
    /// Older engines: MTU change and interface up/down only.
    Legacy {
        change_mtu: Option<ChangeMtuCallback>,
        config_network_if: Option<ConfigNetworkIfCallback>,
    },
}

/// Immutable device construction options.
pub struct KniDeviceConfig {
    /// Kernel interface name (bounded by the kernel's name size).
    pub name: String,
    /// Identifier reported to the kernel callbacks.
    pub port_id: u16,
    /// CPU core hint for the kernel-side thread.
    pub core_id: u32,
    /// Pin the kernel-side thread to `core_id`.
    pub bind_core: bool,
    /// Initial MTU.
    pub mtu: u16,
    /// Initial MAC; `None` means engine-assigned.
    pub mac: Option<MacAddr>,
    pub callbacks: Option<KniCallbacks>,
}

/// Last-known kernel-visible attributes. Values reflect the most recent
/// successful kernel read or write; a failed read leaves them untouched.
#[derive(Debug, Clone)]
struct DeviceInfo {
    link: LinkState,
    mac: MacAddr,
    mtu: u16,
    promisc: PromiscuousMode,
}

/// Shared device state: engine handle, buffer pool, attribute cache, and
/// the packet I/O surface.
///
/// Capture callbacks receive `&KniDeviceCore`, so they can transmit
/// replies and query attributes while the worker owns the receive side.
pub struct KniDeviceCore {
    name: String,
    port_id: u16,
    pub(crate) engine: Arc<dyn KniEngine>,
    pub(crate) handle: KniHandle,
    pub(crate) pool: Arc<dyn BufferPool>,
    ifctl: Box<dyn KernelIfaceCtl>,
    caps: EngineCapabilities,
    info: Mutex<DeviceInfo>,
    pub(crate) opened: AtomicBool,
    pub(crate) capturing: AtomicBool,
    pub(crate) stats: DeviceStats,
}

/// A Kernel-NIC-Interface device.
///
/// Owns at most two background threads: the detached request worker and
/// the joinable capture worker. Dropping the device stops both, drives the
/// link down, and releases the engine handle.
pub struct KniDevice {
    core: Arc<KniDeviceCore>,
    pub(crate) capture: Option<Worker>,
    pub(crate) requests: Option<Worker>,
}

impl std::fmt::Debug for KniDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KniDevice").finish_non_exhaustive()
    }
}

impl Deref for KniDevice {
    type Target = KniDeviceCore;

    fn deref(&self) -> &KniDeviceCore {
        &self.core
    }
}

fn build_ops(port_id: u16, callbacks: Option<KniCallbacks>, caps: &EngineCapabilities) -> KniOps {
    let mut ops = KniOps {
        port_id,
        ..KniOps::default()
    };
    match callbacks {
        None => {}
        Some(KniCallbacks::Legacy {
            change_mtu,
            config_network_if,
        }) => {
            ops.change_mtu = change_mtu;
            ops.config_network_if = config_network_if;
        }
        Some(KniCallbacks::Full(set)) => {
            ops.change_mtu = set.change_mtu;
            ops.config_network_if = set.config_network_if;
            if caps.extended_callbacks {
                ops.config_mac_address = set.config_mac_address;
                ops.config_promiscuity = set.config_promiscuity;
            } else if set.config_mac_address.is_some() || set.config_promiscuity.is_some() {
                warn!("engine version lacks MAC/promiscuity callbacks; ignoring them");
            }
        }
    }
    ops
}

impl KniDevice {
    /// Allocates a uniquely named buffer pool and the engine's KNI object.
    ///
    /// `unique` disambiguates the pool name and must be unique across live
    /// devices in the same process.
    pub fn new(
        engine: Arc<dyn KniEngine>,
        pools: &dyn PoolAllocator,
        ifctl: Box<dyn KernelIfaceCtl>,
        config: KniDeviceConfig,
        pool_size: usize,
        unique: u32,
    ) -> Result<KniDevice> {
        let pool_name = format!("{POOL_NAME_PREFIX}{unique}");
        let pool = pools
            .create(
                &pool_name,
                pool_size,
                MEMPOOL_CACHE_SIZE,
                MBUF_DATA_SIZE,
                SOCKET_ID_ANY,
            )
            .ok_or_else(|| {
                error!(device = %config.name, pool = %pool_name, "failed to create packet buffer pool");
                Error::PoolAllocFailed { name: pool_name.clone() }
            })?;
        debug!(device = %config.name, pool = %pool_name, size = pool_size, "created packet buffer pool");

        let caps = engine.capabilities();
        let conf = KniConf {
            name: config.name.clone(),
            core_id: config.core_id,
            force_bind: config.bind_core,
            mbuf_size: MBUF_DATA_SIZE,
            // initial MAC and MTU are honored together or not at all
            mac: if caps.mac_mtu_conf { config.mac } else { None },
            mtu: if caps.mac_mtu_conf { config.mtu } else { 0 },
        };
        let ops = build_ops(config.port_id, config.callbacks, &caps);
        let handle = engine.alloc(Arc::clone(&pool), &conf, ops).ok_or_else(|| {
            error!(device = %config.name, "engine failed to create KNI device");
            Error::DeviceAllocFailed {
                name: config.name.clone(),
            }
        })?;

        let info = DeviceInfo {
            link: LinkState::NotSupported,
            mac: config.mac.unwrap_or(MacAddr::ZERO),
            mtu: config.mtu,
            promisc: PromiscuousMode::Disable,
        };
        Ok(KniDevice {
            core: Arc::new(KniDeviceCore {
                name: config.name,
                port_id: config.port_id,
                engine,
                handle,
                pool,
                ifctl,
                caps,
                info: Mutex::new(info),
                opened: AtomicBool::new(false),
                capturing: AtomicBool::new(false),
                stats: DeviceStats::new(),
            }),
            capture: None,
            requests: None,
        })
    }

    /// Drives the link up and enables packet I/O. Fails on an engine-side
    /// link error or when already opened.
    pub fn open(&mut self) -> Result<()> {
        if self.core.opened.load(Ordering::SeqCst) {
            error!(device = %self.core.name, "device is already opened");
            return Err(Error::InvalidState("device is already opened"));
        }
        match self.core.update_link_state(LinkState::Up) {
            LinkState::Error => Err(Error::LinkError),
            _ => {
                self.core.opened.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    /// Stops capture if running, drives the link down, and disables
    /// packet I/O.
    pub fn close(&mut self) {
        self.stop_capture();
        self.core.update_link_state(LinkState::Down);
        self.core.opened.store(false, Ordering::SeqCst);
    }
}

impl Drop for KniDevice {
    fn drop(&mut self) {
        self.stop_request_loop();
        self.stop_capture();
        self.core.update_link_state(LinkState::Down);
        if !self.core.engine.release(self.core.handle) {
            error!(device = %self.core.name, "engine failed to release KNI device");
        }
    }
}

impl KniDeviceCore {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port_id(&self) -> u16 {
        self.port_id
    }

    pub fn is_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// The buffer pool this device draws engine buffers from.
    pub fn pool(&self) -> &Arc<dyn BufferPool> {
        &self.pool
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    /// Link state, from the cache or the kernel. A failed kernel query
    /// falls back to the cached value.
    pub fn link_state(&self, mode: InfoMode) -> LinkState {
        if mode == InfoMode::Cached {
            return self.info.lock().unwrap().link;
        }
        match self.ifctl.get_flags(&self.name) {
            Ok(flags) => {
                let state = if flags.is_up() {
                    LinkState::Up
                } else {
                    LinkState::Down
                };
                self.info.lock().unwrap().link = state;
                state
            }
            Err(err) => {
                error!(device = %self.name, %err, "failed to obtain link state from the kernel");
                debug!(device = %self.name, "returning last known link state");
                self.info.lock().unwrap().link
            }
        }
    }

    /// MAC address, from the cache or the kernel.
    pub fn mac_address(&self, mode: InfoMode) -> MacAddr {
        if mode == InfoMode::Cached {
            return self.info.lock().unwrap().mac;
        }
        match self.ifctl.get_hwaddr(&self.name) {
            Ok(mac) => {
                self.info.lock().unwrap().mac = mac;
                mac
            }
            Err(err) => {
                error!(device = %self.name, %err, "failed to obtain MAC address from the kernel");
                debug!(device = %self.name, "returning last known MAC address");
                self.info.lock().unwrap().mac
            }
        }
    }

    /// MTU, from the cache or the kernel.
    pub fn mtu(&self, mode: InfoMode) -> u16 {
        if mode == InfoMode::Cached {
            return self.info.lock().unwrap().mtu;
        }
        match self.ifctl.get_mtu(&self.name) {
            Ok(mtu) => {
                self.info.lock().unwrap().mtu = mtu;
                mtu
            }
            Err(err) => {
                error!(device = %self.name, %err, "failed to obtain MTU from the kernel");
                debug!(device = %self.name, "returning last known MTU");
                self.info.lock().unwrap().mtu
            }
        }
    }

    /// Promiscuous mode, from the cache or the kernel.
    pub fn promiscuous(&self, mode: InfoMode) -> PromiscuousMode {
        if mode == InfoMode::Cached {
            return self.info.lock().unwrap().promisc;
        }
        match self.ifctl.get_flags(&self.name) {
            Ok(flags) => {
                let mode = if flags.is_promisc() {
                    PromiscuousMode::Enable
                } else {
                    PromiscuousMode::Disable
                };
                self.info.lock().unwrap().promisc = mode;
                mode
            }
            Err(err) => {
                error!(device = %self.name, %err, "failed to obtain promiscuous mode from the kernel");
                debug!(device = %self.name, "returning last known promiscuous mode");
                self.info.lock().unwrap().promisc
            }
        }
    }

    /// Sets the kernel-side link state. The flags word is only written
    /// when the up bit actually differs.
    pub fn set_link_state(&self, state: LinkState) -> Result<()> {
        if !state.is_settable() {
            return Err(Error::InvalidArgument(
                "link state must be Up or Down".to_string(),
            ));
        }
        let mut flags = self.ifctl.get_flags(&self.name).map_err(|err| {
            error!(device = %self.name, %err, "failed to obtain interface flags from the kernel");
            err
        })?;
        if flags.is_up() != (state == LinkState::Up) {
            flags.toggle_up();
            self.ifctl.set_flags(&self.name, flags).map_err(|err| {
                error!(device = %self.name, %err, "failed to set link state");
                err
            })?;
        }
        self.info.lock().unwrap().link = state;
        Ok(())
    }

    /// Sets the kernel-side MAC address. Rejects addresses the MAC type
    /// deems unassignable.
    pub fn set_mac_address(&self, mac: MacAddr) -> Result<()> {
        if !mac.is_valid() {
            return Err(Error::InvalidArgument(format!(
                "{mac} is not an assignable MAC address"
            )));
        }
        self.ifctl.set_hwaddr(&self.name, mac).map_err(|err| {
            error!(device = %self.name, %err, "failed to set MAC address");
            err
        })?;
        self.info.lock().unwrap().mac = mac;
        Ok(())
    }

    /// Sets the kernel-side MTU. Any 16-bit value is accepted.
    pub fn set_mtu(&self, mtu: u16) -> Result<()> {
        self.ifctl.set_mtu(&self.name, mtu).map_err(|err| {
            error!(device = %self.name, %err, "failed to set MTU");
            err
        })?;
        self.info.lock().unwrap().mtu = mtu;
        Ok(())
    }

    /// Sets the kernel-side promiscuous mode. The flags word is only
    /// written when the bit actually differs.
    pub fn set_promiscuous(&self, mode: PromiscuousMode) -> Result<()> {
        let mut flags = self.ifctl.get_flags(&self.name).map_err(|err| {
            error!(device = %self.name, %err, "failed to obtain interface flags from the kernel");
            err
        })?;
        if flags.is_promisc() != (mode == PromiscuousMode::Enable) {
            flags.toggle_promisc();
            self.ifctl.set_flags(&self.name, flags).map_err(|err| {
                error!(device = %self.name, %err, "failed to set promiscuous mode");
                err
            })?;
        }
        self.info.lock().unwrap().promisc = mode;
        Ok(())
    }

    /// Informs the engine side that the link changed, in addition to the
    /// kernel-visible state.
    ///
    /// Returns the previous state, `NotSupported` when the engine lacks
    /// link updates, or `Error`. The cache is updated only on a real
    /// previous state.
    pub fn update_link_state(&self, state: LinkState) -> LinkState {
        if !state.is_settable() {
            return LinkState::Error;
        }
        if !self.caps.link_update {
            return LinkState::NotSupported;
        }
        let previous = self.engine.update_link(self.handle, state);
        match previous {
            LinkState::Error => {
                // Some engine versions report spurious failures here, so
                // keep this quiet.
                debug!(device = %self.name, "engine failed to update link state");
            }
            LinkState::NotSupported => {}
            _ => self.info.lock().unwrap().link = state,
        }
        previous
    }

    /// Pumps pending kernel configuration requests once, dispatching the
    /// callbacks registered at construction. False on engine failure.
    pub fn handle_requests(&self) -> bool {
        self.engine.handle_request(self.handle)
    }
}
