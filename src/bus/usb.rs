//! USB bus backed by `hidapi`.
//!
//! Each enumerated HID interface becomes one scan result located at its
//! platform device path. Interfaces on the generic desktop usage page are
//! classed as HID; everything else stays unclassified and is left to the
//! mapping table.

use crate::bus::{sync_devices, BusCore, PeripheralBus};
use crate::manager::PeripheralManager;
use crate::scan::ScanResult;
use crate::types::{BusType, PeripheralType};
use hidapi::{DeviceInfo, HidApi};
use parking_lot::Mutex;

/// Generic desktop controls (keyboards, mice, joysticks, remotes).
const GENERIC_DESKTOP_PAGE: u16 = 0x01;

pub struct UsbBus {
    core: BusCore,
    api: Mutex<Option<HidApi>>,
}

impl UsbBus {
    pub fn new() -> Self {
        Self {
            core: BusCore::new(BusType::Usb),
            api: Mutex::new(None),
        }
    }

    fn scan_result(info: &DeviceInfo) -> ScanResult {
        let class = if info.usage_page() == GENERIC_DESKTOP_PAGE {
            PeripheralType::Hid
        } else {
            PeripheralType::Unknown
        };
        let mut result = ScanResult::new(info.path().to_string_lossy())
            .with_bus(BusType::Usb)
            .with_class(class)
            .with_ids(info.vendor_id(), info.product_id());
        result.friendly_name = info.product_string().map(str::to_string);
        result
    }

    fn enumerate(&self) -> Option<Vec<ScanResult>> {
        let mut guard = self.api.lock();
        let api = guard.as_mut()?;
        if let Err(e) = api.refresh_devices() {
            tracing::warn!(error = %e, "hid enumeration failed");
            return None;
        }

        let mut found: Vec<ScanResult> = Vec::new();
        for info in api.device_list() {
            let result = Self::scan_result(info);
            // Composite devices list one path per interface; keep the first.
            if found.iter().all(|r| r.location != result.location) {
                found.push(result);
            }
        }
        Some(found)
    }
}

impl Default for UsbBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralBus for UsbBus {
    fn bus_type(&self) -> BusType {
        BusType::Usb
    }

    fn initialise(&self) -> bool {
        match HidApi::new() {
            Ok(api) => {
                *self.api.lock() = Some(api);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialise the hid api");
                false
            }
        }
    }

    fn trigger_device_scan(&self, registry: &PeripheralManager) {
        // The api lock is released before devices are created.
        let Some(found) = self.enumerate() else {
            return;
        };
        tracing::debug!(count = found.len(), "usb scan");
        sync_devices(self, registry, &found);
    }

    fn core(&self) -> &BusCore {
        &self.core
    }

    fn shutdown(&self) {
        self.core.clear();
        *self.api.lock() = None;
    }
}
