//! Test fakes for the external collaborator seams: engine, pool allocator,
//! and kernel interface control.

use crate::device::{KniCallbackSet, KniCallbacks, KniDevice, KniDeviceConfig};
use crate::engine::{
    BufferPool, EngineCapabilities, KniConf, KniEngine, KniHandle, KniOps, Mbuf, PoolAllocator,
};
use crate::error::{Error, Result};
use crate::iface::{IfaceFlags, KernelIfaceCtl};
use crate::packet::PacketSlot;
use crate::types::{LinkState, MacAddr};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Fixed-capacity pool that tracks outstanding buffers.
pub(crate) struct MockPool {
    name: String,
    capacity: usize,
    data_room: usize,
    in_use: AtomicUsize,
}

impl MockPool {
    pub fn new(name: &str, capacity: usize, data_room: usize) -> Arc<dyn BufferPool> {
        Arc::new(MockPool {
            name: name.to_string(),
            capacity,
            data_room,
            in_use: AtomicUsize::new(0),
        })
    }
}

impl BufferPool for MockPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn data_room(&self) -> usize {
        self.data_room
    }

    fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Option<Vec<u8>> {
        let mut current = self.in_use.load(Ordering::SeqCst);
        loop {
            if current >= self.capacity {
                return None;
            }
            match self.in_use.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(vec![0; self.data_room]),
                Err(actual) => current = actual,
            }
        }
    }

    fn reclaim(&self, _backing: Vec<u8>) {
        self.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Pool allocator recording the names it was asked for.
#[derive(Default)]
pub(crate) struct MockAllocator {
    pub fail: bool,
    created: Mutex<Vec<String>>,
}

impl MockAllocator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

impl PoolAllocator for MockAllocator {
    fn create(
        &self,
        name: &str,
        size: usize,
        _cache_size: usize,
        data_room: usize,
        _socket_id: i32,
    ) -> Option<Arc<dyn BufferPool>> {
        if self.fail {
            return None;
        }
        self.created.lock().unwrap().push(name.to_string());
        Some(MockPool::new(name, size, data_room))
    }
}

/// A kernel-originated configuration event waiting to be pumped.
pub(crate) enum KernelEvent {
    ChangeMtu(u16),
    NetworkIf(bool),
    MacAddress(MacAddr),
    Promiscuity(bool),
}

struct EngineState {
    rx_ring: VecDeque<Mbuf>,
    tx_accept: usize,
    tx_consumed: Vec<Vec<u8>>,
    pending: VecDeque<KernelEvent>,
    pumps: usize,
    link: LinkState,
    update_link_fails: bool,
    alloc_fails: bool,
    released: bool,
    conf: Option<KniConf>,
    ops: Option<KniOps>,
}

/// Scriptable engine: an in-memory receive ring, a transmit acceptance
/// limit, and a queue of kernel events dispatched on pump.
pub(crate) struct MockEngine {
    caps: EngineCapabilities,
    state: Mutex<EngineState>,
}

impl MockEngine {
    pub fn with_caps(caps: EngineCapabilities) -> Arc<Self> {
        Arc::new(MockEngine {
            caps,
            state: Mutex::new(EngineState {
                rx_ring: VecDeque::new(),
                tx_accept: usize::MAX,
                tx_consumed: Vec::new(),
                pending: VecDeque::new(),
                pumps: 0,
                link: LinkState::Down,
                update_link_fails: false,
                alloc_fails: false,
                released: false,
                conf: None,
                ops: None,
            }),
        })
    }

    pub fn new() -> Arc<Self> {
        Self::with_caps(EngineCapabilities {
            link_update: true,
            extended_callbacks: true,
            mac_mtu_conf: true,
        })
    }

    /// Places a packet on the receive ring, drawing its buffer from `pool`
    /// the way the real engine would.
    pub fn push_rx(&self, pool: &Arc<dyn BufferPool>, payload: &[u8]) {
        let mbuf = Mbuf::from_payload(pool, payload).expect("mock pool exhausted");
        self.state.lock().unwrap().rx_ring.push_back(mbuf);
    }

    /// Limits how many buffers each `tx_burst` call accepts.
    pub fn set_tx_accept(&self, accept: usize) {
        self.state.lock().unwrap().tx_accept = accept;
    }

    /// Payloads of the buffers the engine consumed on transmit, in order.
    pub fn tx_consumed(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().tx_consumed.clone()
    }

    pub fn queue_event(&self, event: KernelEvent) {
        self.state.lock().unwrap().pending.push_back(event);
    }

    pub fn pumps(&self) -> usize {
        self.state.lock().unwrap().pumps
    }

    pub fn link(&self) -> LinkState {
        self.state.lock().unwrap().link
    }

    pub fn set_update_link_fails(&self, fails: bool) {
        self.state.lock().unwrap().update_link_fails = fails;
    }

    pub fn set_alloc_fails(&self, fails: bool) {
        self.state.lock().unwrap().alloc_fails = fails;
    }

    pub fn released(&self) -> bool {
        self.state.lock().unwrap().released
    }

    /// The conf the last successful `alloc` received.
    pub fn alloc_conf(&self) -> Option<KniConf> {
        self.state.lock().unwrap().conf.clone()
    }
}

impl KniEngine for MockEngine {
    fn capabilities(&self) -> EngineCapabilities {
        self.caps
    }

    fn alloc(
        &self,
        _pool: Arc<dyn BufferPool>,
        conf: &KniConf,
        ops: KniOps,
    ) -> Option<KniHandle> {
        let mut state = self.state.lock().unwrap();
        if state.alloc_fails {
            return None;
        }
        state.conf = Some(conf.clone());
        state.ops = Some(ops);
        Some(KniHandle(1))
    }

    fn release(&self, _handle: KniHandle) -> bool {
        self.state.lock().unwrap().released = true;
        true
    }

    fn rx_burst(&self, _handle: KniHandle, cap: usize) -> Vec<Mbuf> {
        let mut state = self.state.lock().unwrap();
        let n = cap.min(state.rx_ring.len());
        state.rx_ring.drain(..n).collect()
    }

    fn tx_burst(&self, _handle: KniHandle, bufs: &mut Vec<Mbuf>) -> usize {
        let mut state = self.state.lock().unwrap();
        let n = bufs.len().min(state.tx_accept);
        for mbuf in bufs.drain(..n) {
            // the engine frees the buffer after "transmitting" it
            state.tx_consumed.push(mbuf.data().to_vec());
        }
        n
    }

    fn handle_request(&self, _handle: KniHandle) -> bool {
        let mut state = self.state.lock().unwrap();
        state.pumps += 1;
        while let Some(event) = state.pending.pop_front() {
            let Some(ops) = &state.ops else { continue };
            match event {
                KernelEvent::ChangeMtu(mtu) => {
                    if let Some(cb) = &ops.change_mtu {
                        cb(ops.port_id, mtu);
                    }
                }
                KernelEvent::NetworkIf(up) => {
                    if let Some(cb) = &ops.config_network_if {
                        cb(ops.port_id, up);
                    }
                }
                KernelEvent::MacAddress(mac) => {
                    if let Some(cb) = &ops.config_mac_address {
                        cb(ops.port_id, mac);
                    }
                }
                KernelEvent::Promiscuity(on) => {
                    if let Some(cb) = &ops.config_promiscuity {
                        cb(ops.port_id, on);
                    }
                }
            }
        }
        true
    }

    fn update_link(&self, _handle: KniHandle, state: LinkState) -> LinkState {
        if !self.caps.link_update {
            return LinkState::NotSupported;
        }
        let mut engine = self.state.lock().unwrap();
        if engine.update_link_fails {
            return LinkState::Error;
        }
        std::mem::replace(&mut engine.link, state)
    }
}

#[derive(Debug)]
struct IfaceState {
    flags: IfaceFlags,
    hwaddr: MacAddr,
    mtu: u16,
    failing: HashSet<&'static str>,
    set_flags_calls: usize,
    set_hwaddr_calls: usize,
    set_mtu_calls: usize,
}

/// Programmable kernel interface control with per-operation failure
/// injection.
pub(crate) struct MockIfaceCtl {
    state: Mutex<IfaceState>,
}

impl MockIfaceCtl {
    pub fn new() -> Arc<Self> {
        Arc::new(MockIfaceCtl {
            state: Mutex::new(IfaceState {
                flags: IfaceFlags(0),
                hwaddr: MacAddr([0x02, 0, 0, 0, 0, 1]),
                mtu: 1500,
                failing: HashSet::new(),
                set_flags_calls: 0,
                set_hwaddr_calls: 0,
                set_mtu_calls: 0,
            }),
        })
    }

    /// Makes one of `get_flags`, `set_flags`, `get_hwaddr`, `set_hwaddr`,
    /// `get_mtu`, `set_mtu` fail from now on.
    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn set_kernel_flags(&self, flags: IfaceFlags) {
        self.state.lock().unwrap().flags = flags;
    }

    pub fn set_kernel_mtu(&self, mtu: u16) {
        self.state.lock().unwrap().mtu = mtu;
    }

    pub fn kernel_flags(&self) -> IfaceFlags {
        self.state.lock().unwrap().flags
    }

    pub fn kernel_hwaddr(&self) -> MacAddr {
        self.state.lock().unwrap().hwaddr
    }

    pub fn set_flags_calls(&self) -> usize {
        self.state.lock().unwrap().set_flags_calls
    }

    pub fn set_hwaddr_calls(&self) -> usize {
        self.state.lock().unwrap().set_hwaddr_calls
    }

    pub fn set_mtu_calls(&self) -> usize {
        self.state.lock().unwrap().set_mtu_calls
    }

    fn check(&self, op: &'static str, name: &str) -> Result<()> {
        if self.state.lock().unwrap().failing.contains(op) {
            return Err(Error::IfaceRequest {
                op,
                name: name.to_string(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        Ok(())
    }
}

impl KernelIfaceCtl for Arc<MockIfaceCtl> {
    fn get_flags(&self, name: &str) -> Result<IfaceFlags> {
        self.check("get_flags", name)?;
        Ok(self.state.lock().unwrap().flags)
    }

    fn set_flags(&self, name: &str, flags: IfaceFlags) -> Result<()> {
        self.check("set_flags", name)?;
        let mut state = self.state.lock().unwrap();
        state.flags = flags;
        state.set_flags_calls += 1;
        Ok(())
    }

    fn get_hwaddr(&self, name: &str) -> Result<MacAddr> {
        self.check("get_hwaddr", name)?;
        Ok(self.state.lock().unwrap().hwaddr)
    }

    fn set_hwaddr(&self, name: &str, mac: MacAddr) -> Result<()> {
        self.check("set_hwaddr", name)?;
        let mut state = self.state.lock().unwrap();
        state.hwaddr = mac;
        state.set_hwaddr_calls += 1;
        Ok(())
    }

    fn get_mtu(&self, name: &str) -> Result<u16> {
        self.check("get_mtu", name)?;
        Ok(self.state.lock().unwrap().mtu)
    }

    fn set_mtu(&self, name: &str, mtu: u16) -> Result<()> {
        self.check("set_mtu", name)?;
        let mut state = self.state.lock().unwrap();
        state.mtu = mtu;
        state.set_mtu_calls += 1;
        Ok(())
    }
}

pub(crate) fn test_config(name: &str, port_id: u16) -> KniDeviceConfig {
    KniDeviceConfig {
        name: name.to_string(),
        port_id,
        core_id: 0,
        bind_core: false,
        mtu: 1500,
        mac: None,
        callbacks: None,
    }
}

/// A device wired to fresh mocks, plus handles to script them.
pub(crate) struct TestBench {
    pub device: KniDevice,
    pub engine: Arc<MockEngine>,
    pub ifctl: Arc<MockIfaceCtl>,
}

impl TestBench {
    fn build(
        engine: Arc<MockEngine>,
        pool_size: usize,
        port_id: u16,
        callbacks: Option<KniCallbacks>,
    ) -> TestBench {
        let ifctl = MockIfaceCtl::new();
        let mut config = test_config("vEthTest", port_id);
        config.callbacks = callbacks;
        let device = KniDevice::new(
            Arc::clone(&engine) as Arc<dyn KniEngine>,
            &MockAllocator::default(),
            Box::new(Arc::clone(&ifctl)),
            config,
            pool_size,
            1,
        )
        .expect("test device construction failed");
        TestBench {
            device,
            engine,
            ifctl,
        }
    }

    pub fn new() -> TestBench {
        Self::build(MockEngine::new(), 512, 0, None)
    }

    pub fn opened() -> TestBench {
        let mut bench = Self::new();
        bench.device.open().expect("test device open failed");
        bench
    }

    /// Opened bench whose pool holds only `capacity` buffers.
    pub fn with_pool_capacity(capacity: usize) -> TestBench {
        let mut bench = Self::build(MockEngine::new(), capacity, 0, None);
        bench.device.open().expect("test device open failed");
        bench
    }

    /// Bench whose engine lacks the link-update capability.
    pub fn without_link_update() -> TestBench {
        Self::build(
            MockEngine::with_caps(EngineCapabilities {
                link_update: false,
                extended_callbacks: true,
                mac_mtu_conf: true,
            }),
            512,
            0,
            None,
        )
    }

    /// Bench with the full callback set, populated by `fill`.
    pub fn with_callbacks(fill: impl FnOnce(&mut KniCallbackSet)) -> TestBench {
        let mut set = KniCallbackSet::default();
        fill(&mut set);
        Self::build(MockEngine::new(), 512, 7, Some(KniCallbacks::Full(set)))
    }

    /// Places a packet on the device's receive ring.
    pub fn push_rx(&self, payload: &[u8]) {
        self.engine.push_rx(self.device.pool(), payload);
    }

    /// Builds an engine-native slot holding `payload`.
    pub fn native_slot(&self, payload: &[u8]) -> PacketSlot {
        let mbuf = Mbuf::from_payload(self.device.pool(), payload).expect("mock pool exhausted");
        let mut slot = PacketSlot::new();
        slot.attach(mbuf, SystemTime::now());
        slot
    }

    pub fn native_slots(&self, count: usize, payload: &[u8]) -> Vec<PacketSlot> {
        (0..count).map(|_| self.native_slot(payload)).collect()
    }
}
