//! Configuration types

use crate::device::KniDeviceConfig;
use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// User-defined device configuration (TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub device: DeviceSection,
    #[serde(default)]
    pub requests: RequestsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSection {
    /// Kernel interface name.
    pub name: String,
    /// Port identifier reported to the kernel callbacks.
    pub port_id: u16,
    #[serde(default)]
    pub core_id: u32,
    #[serde(default)]
    pub bind_core: bool,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
    /// Initial MAC; absent means engine-assigned.
    pub mac: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestsSection {
    /// Sleep between kernel request pumps.
    #[serde(default = "default_sleep_ms")]
    pub sleep_ms: u64,
}

impl Default for RequestsSection {
    fn default() -> Self {
        Self {
            sleep_ms: default_sleep_ms(),
        }
    }
}

fn default_mtu() -> u16 {
    1500
}

fn default_pool_size() -> usize {
    2048
}

fn default_sleep_ms() -> u64 {
    500
}

impl FileConfig {
    /// Builds the programmatic device configuration. Callbacks start out
    /// unset and are attached by the caller.
    pub fn device_config(&self) -> Result<KniDeviceConfig> {
        let mac = match &self.device.mac {
            Some(s) => Some(
                s.parse()
                    .map_err(|_| Error::Config(format!("device.mac {s:?} is not a MAC address")))?,
            ),
            None => None,
        };
        Ok(KniDeviceConfig {
            name: self.device.name.clone(),
            port_id: self.device.port_id,
            core_id: self.device.core_id,
            bind_core: self.device.bind_core,
            mtu: self.device.mtu,
            mac,
            callbacks: None,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.device.pool_size
    }

    pub fn request_sleep(&self) -> Duration {
        Duration::from_millis(self.requests.sleep_ms)
    }
}
