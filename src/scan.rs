//! Device identity and scan results.
//!
//! [`ScanResult`] is the raw, pre-classification description of a device a bus
//! found while enumerating its transport. Buses populate what they know;
//! the resolver fills in `resolved_type` and `friendly_name` when a mapping
//! rule matches, after which the result is handed to peripheral construction
//! and no longer changes.
//!
//! # Conventions
//! - `bus_type` may be left [`BusType::Unknown`]; the registry substitutes the
//!   type of the bus that reported the device.
//! - `device_class` is the bus's own guess (e.g. `hid` for a Generic Desktop
//!   HID interface) and is what rule `class` filters compare against.
//! - `location` is an opaque, bus-specific path. It is the identity a bus uses
//!   to index its peripherals, so it must be stable for as long as the device
//!   stays attached.
//!
//! ## Persistence notes
//! - `vendor_id`/`product_id` identify a *model*, not an individual device.
//! - `location` may change across ports and reconnects; treat it as identity
//!   only while the device remains plugged in.

use crate::types::{format_hex_id, BusType, PeripheralType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// USB-style vendor/product pair declared by a mapping rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            format_hex_id(self.vendor_id),
            format_hex_id(self.product_id)
        )
    }
}

/// Snapshot of one device seen during a bus scan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Bus the device was seen on; `Unknown` means "the reporting bus".
    pub bus_type: BusType,

    /// Class reported by the bus (what rule `class` filters match).
    pub device_class: PeripheralType,

    /// Vendor ID (VID), `0` if the transport has none.
    pub vendor_id: u16,

    /// Product ID (PID), `0` if the transport has none.
    pub product_id: u16,

    /// Bus-specific location path. Unique per bus while attached.
    pub location: String,

    /// Type chosen by the first matching mapping rule.
    pub resolved_type: Option<PeripheralType>,

    /// Name of the first matching mapping rule.
    pub friendly_name: Option<String>,
}

impl ScanResult {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    pub fn with_bus(mut self, bus_type: BusType) -> Self {
        self.bus_type = bus_type;
        self
    }

    pub fn with_class(mut self, device_class: PeripheralType) -> Self {
        self.device_class = device_class;
        self
    }

    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.vendor_id, self.product_id)
    }
}
