//! Point-in-time view of every registered peripheral.
//!
//! [`Snapshot`] is an **owned**, read-only copy of the registry's peripherals
//! produced by [`PeripheralManager::snapshot`](crate::manager::PeripheralManager::snapshot).
//! It holds no handles, so it can be kept, cloned and sent across threads
//! while the registry keeps scanning.
//!
//! # Semantics
//! - Entries are ordered by bus (registry order), then by registration order
//!   within the bus.
//! - Settings are copied as their current values; specs are not included.
//! - A snapshot never refreshes. Take a new one after a scan.
//!
//! # Examples
//! ```no_run
//! use peripherals::{NullHost, PeripheralManager, RegistryConfig};
//! use std::sync::Arc;
//!
//! let registry = PeripheralManager::new(RegistryConfig::default(), Arc::new(NullHost));
//! registry.initialise().unwrap();
//! let snap = registry.snapshot();
//! for info in snap.iter() {
//!     println!("{} {} ({})", info.bus, info.location, info.name);
//! }
//! println!("{}", snap.to_json().unwrap());
//! ```

use crate::peripheral::Peripheral;
use crate::setting::SettingValue;
use crate::types::{format_hex_id, BusType, Feature, PeripheralType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Copy of one peripheral's identity, features and setting values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeripheralInfo {
    pub bus: BusType,
    pub location: String,
    pub path: String,
    pub name: String,
    pub peripheral_type: PeripheralType,
    /// 4-digit uppercase hex.
    pub vendor_id: String,
    pub product_id: String,
    pub features: Vec<Feature>,
    pub settings: BTreeMap<String, SettingValue>,
}

impl From<&Peripheral> for PeripheralInfo {
    fn from(p: &Peripheral) -> Self {
        Self {
            bus: p.bus_type(),
            location: p.location().to_string(),
            path: p.file_location(),
            name: p.device_name().to_string(),
            peripheral_type: p.peripheral_type(),
            vendor_id: format_hex_id(p.vendor_id()),
            product_id: format_hex_id(p.product_id()),
            features: p.features().to_vec(),
            settings: p
                .settings()
                .map(|(k, s)| (k.clone(), s.value().clone()))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot(pub Vec<PeripheralInfo>);

impl Snapshot {
    /// First entry at `location`, on any bus.
    #[inline]
    pub fn get(&self, location: &str) -> Option<&PeripheralInfo> {
        self.0.iter().find(|p| p.location == location)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PeripheralInfo> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pretty-printed JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }

    #[inline]
    pub fn into_inner(self) -> Vec<PeripheralInfo> {
        self.0
    }
}
