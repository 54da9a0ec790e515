//! Configuration validation

use super::FileConfig;
use crate::types::MacAddr;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

// Kernel interface names are bounded by IFNAMSIZ including the NUL.
const MAX_NAME_LEN: usize = 15;

/// Validates a configuration and returns warnings/errors.
pub fn validate(config: &FileConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    let name = &config.device.name;
    if name.is_empty() {
        result.error("device.name: must not be empty");
    } else if name.len() > MAX_NAME_LEN {
        result.error(format!(
            "device.name: {name:?} exceeds the kernel name limit of {MAX_NAME_LEN}"
        ));
    }
    if name.contains(|c: char| c.is_whitespace() || c == '/' || c == '\0') {
        result.error(format!("device.name: {name:?} contains invalid characters"));
    }

    if let Some(mac) = &config.device.mac {
        match mac.parse::<MacAddr>() {
            Ok(parsed) if !parsed.is_valid() => {
                result.error(format!("device.mac: {mac} is not an assignable address"));
            }
            Ok(_) => {}
            Err(_) => result.error(format!("device.mac: {mac:?} is not a MAC address")),
        }
    }

    if config.device.mtu < 68 {
        result.warn(format!(
            "device.mtu: {} is below the IPv4 minimum of 68",
            config.device.mtu
        ));
    }

    if config.device.pool_size == 0 {
        result.error("device.pool_size: must be at least 1");
    }

    if config.requests.sleep_ms == 0 {
        result.warn("requests.sleep_ms: 0 busy-spins the request worker");
    }

    result
}
