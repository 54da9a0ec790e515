//! Kernel interface control
//!
//! The attribute bridge reads and writes the kernel-visible side of a KNI
//! interface through the six classic interface ioctls, addressed by name.

use crate::error::{Error, Result};
use crate::types::MacAddr;
use std::io;
use std::os::unix::io::RawFd;

/// Flags word of a kernel network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfaceFlags(pub i16);

impl IfaceFlags {
    pub fn is_up(&self) -> bool {
        self.0 & libc::IFF_UP as i16 != 0
    }

    pub fn is_promisc(&self) -> bool {
        self.0 & libc::IFF_PROMISC as i16 != 0
    }

    pub fn toggle_up(&mut self) {
        self.0 ^= libc::IFF_UP as i16;
    }

    pub fn toggle_promisc(&mut self) {
        self.0 ^= libc::IFF_PROMISC as i16;
    }
}

/// Get/set requests against a kernel-visible interface, by name.
///
/// One method per ioctl: flags (link and promiscuous bits), hardware
/// address, and MTU.
pub trait KernelIfaceCtl: Send + Sync {
    fn get_flags(&self, name: &str) -> Result<IfaceFlags>;
    fn set_flags(&self, name: &str, flags: IfaceFlags) -> Result<()>;
    fn get_hwaddr(&self, name: &str) -> Result<MacAddr>;
    fn set_hwaddr(&self, name: &str, mac: MacAddr) -> Result<()>;
    fn get_mtu(&self, name: &str) -> Result<u16>;
    fn set_mtu(&self, name: &str, mtu: u16) -> Result<()>;
}

/// Builds a zeroed `ifreq` carrying `name`.
fn ifreq_for(name: &str) -> Result<libc::ifreq> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= libc::IFNAMSIZ || bytes.contains(&0) {
        return Err(Error::InvalidArgument(format!(
            "interface name {name:?} does not fit IFNAMSIZ"
        )));
    }
    let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
    for (dst, src) in req.ifr_name.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    Ok(req)
}

/// ioctl-backed implementation over an `AF_INET` datagram socket.
pub struct LinuxIfaceCtl {
    fd: RawFd,
}

impl LinuxIfaceCtl {
    pub fn new() -> Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(Self { fd })
    }

    fn request(
        &self,
        op: &'static str,
        cmd: libc::c_ulong,
        name: &str,
        req: &mut libc::ifreq,
    ) -> Result<()> {
        let ret = unsafe { libc::ioctl(self.fd, cmd as _, req as *mut libc::ifreq) };
        if ret < 0 {
            return Err(Error::IfaceRequest {
                op,
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

impl KernelIfaceCtl for LinuxIfaceCtl {
    fn get_flags(&self, name: &str) -> Result<IfaceFlags> {
        let mut req = ifreq_for(name)?;
        self.request("SIOCGIFFLAGS", libc::SIOCGIFFLAGS as _, name, &mut req)?;
        Ok(IfaceFlags(unsafe { req.ifr_ifru.ifru_flags }))
    }

    fn set_flags(&self, name: &str, flags: IfaceFlags) -> Result<()> {
        let mut req = ifreq_for(name)?;
        req.ifr_ifru.ifru_flags = flags.0;
        self.request("SIOCSIFFLAGS", libc::SIOCSIFFLAGS as _, name, &mut req)
    }

    fn get_hwaddr(&self, name: &str) -> Result<MacAddr> {
        let mut req = ifreq_for(name)?;
        unsafe { req.ifr_ifru.ifru_hwaddr.sa_family = libc::ARPHRD_ETHER };
        self.request("SIOCGIFHWADDR", libc::SIOCGIFHWADDR as _, name, &mut req)?;
        let data = unsafe { req.ifr_ifru.ifru_hwaddr.sa_data };
        let mut octets = [0u8; 6];
        for (dst, src) in octets.iter_mut().zip(data.iter()) {
            *dst = *src as u8;
        }
        Ok(MacAddr(octets))
    }

    fn set_hwaddr(&self, name: &str, mac: MacAddr) -> Result<()> {
        let mut req = ifreq_for(name)?;
        let octets = mac.octets();
        unsafe {
            req.ifr_ifru.ifru_hwaddr.sa_family = libc::ARPHRD_ETHER;
            for (dst, src) in req.ifr_ifru.ifru_hwaddr.sa_data.iter_mut().zip(octets.iter()) {
                *dst = *src as libc::c_char;
            }
        }
        self.request("SIOCSIFHWADDR", libc::SIOCSIFHWADDR as _, name, &mut req)
    }

    fn get_mtu(&self, name: &str) -> Result<u16> {
        let mut req = ifreq_for(name)?;
        self.request("SIOCGIFMTU", libc::SIOCGIFMTU as _, name, &mut req)?;
        Ok(unsafe { req.ifr_ifru.ifru_mtu } as u16)
    }

    fn set_mtu(&self, name: &str, mtu: u16) -> Result<()> {
        let mut req = ifreq_for(name)?;
        req.ifr_ifru.ifru_mtu = mtu as libc::c_int;
        self.request("SIOCSIFMTU", libc::SIOCSIFMTU as _, name, &mut req)
    }
}

impl Drop for LinuxIfaceCtl {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}
