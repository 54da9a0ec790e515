//! Common device-facing types

use std::fmt;
use std::str::FromStr;

/// MAC address (6 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    pub const ZERO: MacAddr = MacAddr([0, 0, 0, 0, 0, 0]);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Whether this address may be assigned to an interface.
    ///
    /// The all-zero and broadcast addresses are never assignable.
    pub fn is_valid(&self) -> bool {
        *self != Self::ZERO && !self.is_broadcast()
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error type for MAC address parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMacAddrError;

impl fmt::Display for ParseMacAddrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid MAC address")
    }
}

impl std::error::Error for ParseMacAddrError {}

impl FromStr for MacAddr {
    type Err = ParseMacAddrError;

    /// Parses a colon- or hyphen-separated MAC address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = if s.contains('-') { '-' } else { ':' };
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in s.split(sep) {
            if count == 6 || part.len() != 2 {
                return Err(ParseMacAddrError);
            }
            octets[count] = u8::from_str_radix(part, 16).map_err(|_| ParseMacAddrError)?;
            count += 1;
        }
        if count != 6 {
            return Err(ParseMacAddrError);
        }
        Ok(MacAddr(octets))
    }
}

/// Kernel-visible link state of a KNI interface.
///
/// `Error` and `NotSupported` only ever appear as results of engine-side
/// link updates; the kernel itself reports `Up` or `Down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Error,
    NotSupported,
    Down,
    Up,
}

impl LinkState {
    /// States a caller may request; `Error`/`NotSupported` are results only.
    pub fn is_settable(&self) -> bool {
        matches!(self, LinkState::Up | LinkState::Down)
    }
}

/// Promiscuous mode of the kernel-visible interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiscuousMode {
    Disable,
    Enable,
}

/// Where an attribute getter takes its answer from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoMode {
    /// Return the last cached value without touching the kernel.
    Cached,
    /// Ask the kernel and refresh the cache on success.
    Query,
}
