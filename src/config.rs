//! Registry configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty document is valid:
//!
//! ```toml
//! mapping_file = "/usr/share/app/system/peripherals.xml"
//! data_dir = "/home/user/.app/peripheral_data"
//!
//! [buses]
//! usb = true
//!
//! [capabilities]
//! cec = true
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Mapping rules document. A missing file leaves every device unmapped.
    pub mapping_file: PathBuf,
    /// Private data folder, created during initialise.
    pub data_dir: PathBuf,
    pub buses: BusSelection,
    pub capabilities: Capabilities,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mapping_file: PathBuf::from("peripherals.xml"),
            data_dir: PathBuf::from("peripheral_data"),
            buses: BusSelection::default(),
            capabilities: Capabilities::default(),
        }
    }
}

impl RegistryConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

/// Which built-in buses the registry creates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSelection {
    /// hidapi-backed USB bus. Ignored unless built with the `hid` feature.
    pub usb: bool,
}

impl Default for BusSelection {
    fn default() -> Self {
        Self { usb: true }
    }
}

/// Optional capabilities available to this build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// CEC adapter support. Defaults to whether the `cec` feature is compiled in.
    pub cec: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            cec: cfg!(feature = "cec"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = RegistryConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RegistryConfig::default());
        assert_eq!(cfg.mapping_file, PathBuf::from("peripherals.xml"));
        assert!(cfg.buses.usb);
    }

    #[test]
    fn partial_document_overrides() {
        let cfg = RegistryConfig::from_toml_str(
            r#"
            mapping_file = "/etc/peripherals.xml"

            [capabilities]
            cec = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.mapping_file, PathBuf::from("/etc/peripherals.xml"));
        assert!(!cfg.capabilities.cec);
        assert_eq!(cfg.data_dir, PathBuf::from("peripheral_data"));
    }

    #[test]
    fn bad_types_are_rejected() {
        assert!(matches!(
            RegistryConfig::from_toml_str("mapping_file = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RegistryConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
