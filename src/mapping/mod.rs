//! Mapping rules: which scan results become which peripherals.
//!
//! A [`MappingTable`] is an ordered list of [`MappingRule`]s loaded once from
//! the mappings document (see [`xml`]). Rules are never edited in place; a
//! reload replaces the whole table.
//!
//! Matching is done by [`MappingTable::resolve`]:
//! - the **first** matching rule decides the peripheral type and friendly name;
//! - **every** matching rule contributes settings, later rules overwriting
//!   earlier ones key by key.
//!
//! That lets a wildcard "defaults" rule near the top supply generic settings
//! while a vendor-specific rule further down overrides particular keys.

mod resolve;
pub mod xml;

pub use resolve::Resolution;

use crate::error::MappingError;
use crate::scan::{DeviceIdentity, ScanResult};
use crate::setting::SettingSpec;
use crate::types::{BusType, PeripheralType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One `<peripheral>` declaration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Friendly name given to matched devices.
    pub name: String,
    /// Accepted vendor/product pairs. Empty matches any device.
    pub identities: Vec<DeviceIdentity>,
    /// Bus filter; `Unknown` matches any bus.
    pub bus: BusType,
    /// Device class filter; `Unknown` matches any class.
    pub class: PeripheralType,
    /// Type the matched device is constructed as.
    pub map_to: PeripheralType,
    /// Settings contributed to matched devices, by key.
    pub settings: BTreeMap<String, SettingSpec>,
}

impl MappingRule {
    pub fn matches_identity(&self, identity: DeviceIdentity) -> bool {
        self.identities.is_empty() || self.identities.contains(&identity)
    }

    /// All three filters (identity, bus, class) hold for `result` seen on `bus`.
    pub fn matches(&self, bus: BusType, result: &ScanResult) -> bool {
        self.matches_identity(result.identity())
            && self.bus.accepts(bus)
            && self.class.accepts(result.device_class)
    }
}

/// Ordered, immutable rule list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

impl MappingTable {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    /// Load from a file. A missing file is not an error: the table is empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MappingError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "mapping file does not exist; no devices will be mapped");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(MappingError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_xml_str(&raw)
    }

    pub fn from_xml_str(raw: &str) -> Result<Self, MappingError> {
        xml::parse_rules(raw).map(Self::new)
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
