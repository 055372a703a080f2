use crate::bus::{sync_devices, BusCore, PeripheralBus};
use crate::manager::PeripheralManager;
use crate::scan::ScanResult;
use crate::types::BusType;
use parking_lot::Mutex;

/// In-memory bus whose attached devices are fed by the host.
///
/// `attach`/`detach` only change what the next scan reports; peripherals are
/// created and removed when [`trigger_device_scan`](PeripheralBus::trigger_device_scan)
/// runs.
pub struct VirtualBus {
    core: BusCore,
    attached: Mutex<Vec<ScanResult>>,
    initialise_ok: bool,
}

impl VirtualBus {
    pub fn new(bus_type: BusType) -> Self {
        Self {
            core: BusCore::new(bus_type),
            attached: Mutex::new(Vec::new()),
            initialise_ok: true,
        }
    }

    /// A bus whose `initialise` reports failure.
    pub fn failing(bus_type: BusType) -> Self {
        Self {
            initialise_ok: false,
            ..Self::new(bus_type)
        }
    }

    /// Report `result` on the next scan. Replaces a device at the same location.
    pub fn attach(&self, result: ScanResult) {
        let mut attached = self.attached.lock();
        attached.retain(|r| r.location != result.location);
        attached.push(result);
    }

    /// Stop reporting the device at `location`.
    pub fn detach(&self, location: &str) {
        self.attached.lock().retain(|r| r.location != location);
    }

    pub fn attached(&self) -> Vec<ScanResult> {
        self.attached.lock().clone()
    }
}

impl PeripheralBus for VirtualBus {
    fn bus_type(&self) -> BusType {
        self.core.bus_type()
    }

    fn initialise(&self) -> bool {
        self.initialise_ok
    }

    fn trigger_device_scan(&self, registry: &PeripheralManager) {
        // Snapshot first: the registry may call back into this bus.
        let found = self.attached();
        sync_devices(self, registry, &found);
    }

    fn core(&self) -> &BusCore {
        &self.core
    }
}
