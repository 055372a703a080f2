//! Peripheral buses.
//!
//! A bus is one transport's enumeration and ownership boundary. It scans its
//! transport, hands every newly seen device to the registry's
//! [`create_peripheral`](crate::manager::PeripheralManager::create_peripheral),
//! and owns the peripherals the registry gives back. Transport I/O itself is
//! each implementation's business.
//!
//! Implementations embed a [`BusCore`] for the peripheral collection and get
//! registration, lookups, feature queries and directory listings from the
//! provided methods of [`PeripheralBus`].
//!
//! # Feature flags
//! - **`hid`** enables [`usb::UsbBus`], enumerating HID interfaces via `hidapi`.
//!
//! [`virtual_bus::VirtualBus`] is always available. Its device list is fed
//! by the host, which makes it the bus of choice for host-driven transports
//! (a CEC stack running elsewhere) and for tests.

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod usb;
pub mod virtual_bus;

use crate::manager::PeripheralManager;
use crate::peripheral::{Peripheral, PeripheralHandle};
use crate::scan::ScanResult;
use crate::types::{format_hex_id, BusType, Feature};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Scheme prefix of virtual peripheral paths.
pub const PATH_SCHEME: &str = "peripherals://";

/// Bus-name path segment meaning "every bus".
pub const ALL_BUSES: &str = "all";

/// Bus segment of `peripherals://<bus>/...`, or `None` for a foreign path.
pub fn bus_segment(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(PATH_SCHEME)?;
    Some(rest.split('/').next().unwrap_or(rest))
}

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryItem {
    /// Virtual path, resolvable with `get_by_path`.
    pub path: String,
    /// Friendly name.
    pub label: String,
    /// Identity details for display: `bus`, `location`, `class`, `vendor`, `product`.
    pub properties: BTreeMap<String, String>,
}

impl DirectoryItem {
    fn for_peripheral(peripheral: &Peripheral) -> Self {
        let properties = [
            ("bus", peripheral.bus_type().to_string()),
            ("location", peripheral.location().to_string()),
            ("class", peripheral.peripheral_type().to_string()),
            ("vendor", format_hex_id(peripheral.vendor_id())),
            ("product", format_hex_id(peripheral.product_id())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            path: peripheral.file_location(),
            label: peripheral.device_name().to_string(),
            properties,
        }
    }
}

struct Registered {
    location: String,
    features: Vec<Feature>,
    handle: PeripheralHandle,
}

/// Peripheral collection shared by every bus implementation.
///
/// Indexed by location; registration order is kept for listings and feature
/// queries. Guarded by its own lock, independent of the registry's.
pub struct BusCore {
    bus_type: BusType,
    peripherals: RwLock<Vec<Registered>>,
}

impl BusCore {
    pub fn new(bus_type: BusType) -> Self {
        Self {
            bus_type,
            peripherals: RwLock::new(Vec::new()),
        }
    }

    pub fn bus_type(&self) -> BusType {
        self.bus_type
    }

    /// Take ownership of `peripheral`. Refused when its location is taken.
    pub fn register(&self, peripheral: Peripheral) -> Option<PeripheralHandle> {
        let mut peripherals = self.peripherals.write();
        if peripherals
            .iter()
            .any(|r| r.location == peripheral.location())
        {
            tracing::debug!(
                bus = %self.bus_type,
                location = %peripheral.location(),
                "location already registered"
            );
            return None;
        }

        let entry = Registered {
            location: peripheral.location().to_string(),
            features: peripheral.features().to_vec(),
            handle: Arc::new(Mutex::new(peripheral)),
        };
        let handle = Arc::clone(&entry.handle);
        peripherals.push(entry);
        Some(handle)
    }

    pub fn unregister(&self, location: &str) -> Option<PeripheralHandle> {
        let mut peripherals = self.peripherals.write();
        let index = peripherals.iter().position(|r| r.location == location)?;
        Some(peripherals.remove(index).handle)
    }

    pub fn get(&self, location: &str) -> Option<PeripheralHandle> {
        self.peripherals
            .read()
            .iter()
            .find(|r| r.location == location)
            .map(|r| Arc::clone(&r.handle))
    }

    pub fn contains(&self, location: &str) -> bool {
        self.peripherals.read().iter().any(|r| r.location == location)
    }

    /// Append peripherals exposing `feature` to `results`; returns how many were added.
    pub fn with_feature(&self, results: &mut Vec<PeripheralHandle>, feature: Feature) -> usize {
        let before = results.len();
        results.extend(
            self.peripherals
                .read()
                .iter()
                .filter(|r| r.features.contains(&feature))
                .map(|r| Arc::clone(&r.handle)),
        );
        results.len() - before
    }

    pub fn len(&self) -> usize {
        self.peripherals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peripherals.read().is_empty()
    }

    pub fn locations(&self) -> Vec<String> {
        self.peripherals
            .read()
            .iter()
            .map(|r| r.location.clone())
            .collect()
    }

    pub fn handles(&self) -> Vec<PeripheralHandle> {
        self.peripherals
            .read()
            .iter()
            .map(|r| Arc::clone(&r.handle))
            .collect()
    }

    pub fn get_by_path(&self, path: &str) -> Option<PeripheralHandle> {
        if bus_segment(path)? != self.bus_type.as_str() {
            return None;
        }
        self.peripherals
            .read()
            .iter()
            .find(|r| r.handle.lock().file_location() == path)
            .map(|r| Arc::clone(&r.handle))
    }

    pub fn get_directory(&self, items: &mut Vec<DirectoryItem>) {
        items.extend(
            self.peripherals
                .read()
                .iter()
                .map(|r| DirectoryItem::for_peripheral(&r.handle.lock())),
        );
    }

    /// Drop every peripheral.
    pub fn clear(&self) {
        self.peripherals.write().clear();
    }
}

/// A transport that discovers and owns peripherals.
///
/// Only [`bus_type`](PeripheralBus::bus_type),
/// [`trigger_device_scan`](PeripheralBus::trigger_device_scan) and
/// [`core`](PeripheralBus::core) are required.
///
/// `initialise`, `register` and `shutdown` run while the registry lock is
/// held and must not call back into the registry. `trigger_device_scan` runs without it and is expected
/// to call [`PeripheralManager::create_peripheral`] (usually via
/// [`sync_devices`]).
pub trait PeripheralBus: Send + Sync {
    fn bus_type(&self) -> BusType;

    /// Transport-specific setup. A bus that fails is dropped by the registry.
    fn initialise(&self) -> bool {
        true
    }

    /// Enumerate attached devices and reconcile them with the registered set.
    fn trigger_device_scan(&self, registry: &PeripheralManager);

    fn core(&self) -> &BusCore;

    /// Release every peripheral. Called when the registry is cleared.
    fn shutdown(&self) {
        self.core().clear();
    }

    fn register(&self, peripheral: Peripheral) -> Option<PeripheralHandle> {
        self.core().register(peripheral)
    }

    fn unregister(&self, location: &str) -> Option<PeripheralHandle> {
        self.core().unregister(location)
    }

    fn get_peripheral(&self, location: &str) -> Option<PeripheralHandle> {
        self.core().get(location)
    }

    fn has_peripheral(&self, location: &str) -> bool {
        self.core().contains(location)
    }

    fn get_peripherals_with_feature(
        &self,
        results: &mut Vec<PeripheralHandle>,
        feature: Feature,
    ) -> usize {
        self.core().with_feature(results, feature)
    }

    fn number_of_peripherals(&self) -> usize {
        self.core().len()
    }

    fn get_by_path(&self, path: &str) -> Option<PeripheralHandle> {
        self.core().get_by_path(path)
    }

    /// List this bus's peripherals. The path below the bus segment is ignored.
    fn get_directory(&self, _path: &str, items: &mut Vec<DirectoryItem>) {
        self.core().get_directory(items);
    }
}

/// Reconcile a bus with the devices its transport currently reports.
///
/// New locations go through the registry's construction pipeline; registered
/// locations that are no longer reported are unregistered and announced as
/// removed. A device the registry declines is simply skipped.
pub fn sync_devices(bus: &dyn PeripheralBus, registry: &PeripheralManager, found: &[ScanResult]) {
    let seen: HashSet<&str> = found.iter().map(|r| r.location.as_str()).collect();

    for location in bus.core().locations() {
        if seen.contains(location.as_str()) {
            continue;
        }
        if let Some(handle) = bus.unregister(&location) {
            tracing::debug!(bus = %bus.bus_type(), location = %location, "device removed");
            registry.on_device_deleted(bus.bus_type(), &handle);
        }
    }

    for result in found {
        if bus.has_peripheral(&result.location) {
            continue;
        }
        // Unmapped and failed devices come back as None; keep scanning.
        registry.create_peripheral(bus, result);
    }
}
