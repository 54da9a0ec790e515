//! Device configuration loading
//!
//! Handles the TOML device description and its validation. Callbacks are
//! code, not data, so they are attached programmatically after loading.

mod types;
mod validation;

pub use types::{DeviceSection, FileConfig, RequestsSection};
pub use validation::{validate, ValidationResult};

use crate::{Error, Result};
use std::path::Path;

/// Loads a device configuration from a TOML file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let config: FileConfig = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(load("/nonexistent/kni.toml"), Err(Error::Io(_))));
    }
}
