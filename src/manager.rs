//! The peripheral registry.
//!
//! [`PeripheralManager`] owns the buses, the mapping table and the listener
//! bus. The host builds one at its composition root, registers the buses it
//! wants, and drives it through `initialise` / `clear`.
//!
//! # Locking
//! One registry lock guards the bus list, the mapping table, the lifecycle
//! phase and the missing-capability flag. It is only ever held inside a
//! single method body: buses are selected under it and then used after it is
//! released, so a bus scan may call back into
//! [`create_peripheral`](PeripheralManager::create_peripheral) without
//! deadlocking. Registration into a bus and `clear`'s bus shutdown are the
//! exceptions; both run under the registry lock so a location lives on at
//! most one bus and nothing outlives a `clear`. The order is always registry
//! lock, then bus collection; buses never call back while registering.
//! Peripherals live behind their own handles. Events are emitted after
//! every other lock is gone.

use crate::bus::{bus_segment, DirectoryItem, PeripheralBus, ALL_BUSES};
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::events::{EventFilter, RegistryEvent, RegistryEventBus, RegistryListener};
use crate::host::{Host, HostNotifier};
use crate::input::{Action, ActionId, Keypress};
use crate::mapping::MappingTable;
use crate::peripheral::{CecStateChange, Peripheral, PeripheralHandle, PeripheralKind};
use crate::scan::ScanResult;
use crate::setting::SettingValue;
use crate::snapshot::{PeripheralInfo, Snapshot};
use crate::types::{BusType, Feature, PeripheralType};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Host setting whose change makes CEC adapters stop following the TV's menu language.
pub const LANGUAGE_SETTING: &str = "locale.language";
/// CEC adapter setting cleared when the host language changes.
pub const USE_TV_MENU_LANGUAGE: &str = "use_tv_menu_language";
/// Host settings action that opens the peripheral manager.
pub const PERIPHERALS_ACTION: &str = "input.peripherals";

/// Builds a fresh bus each time the registry initialises.
pub type BusFactory = Box<dyn Fn() -> Arc<dyn PeripheralBus> + Send + Sync>;

/// Lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialised,
    /// Mapping loaded and buses up; the first scan is running.
    Started,
    Initialised,
}

struct RegistryState {
    phase: Phase,
    buses: Vec<Arc<dyn PeripheralBus>>,
    mappings: Arc<MappingTable>,
    cec_warning_shown: bool,
    /// Bumped by every `clear`; survives the reset.
    generation: u64,
}

impl RegistryState {
    fn new(generation: u64) -> Self {
        Self {
            phase: Phase::Uninitialised,
            buses: Vec::new(),
            mappings: Arc::new(MappingTable::default()),
            cec_warning_shown: false,
            generation,
        }
    }

    fn owns(&self, bus: &dyn PeripheralBus) -> bool {
        let wanted = std::ptr::from_ref(bus).cast::<()>();
        self.buses
            .iter()
            .any(|b| Arc::as_ptr(b).cast::<()>() == wanted)
    }

    /// Bus already holding a peripheral at `location`.
    fn bus_holding(&self, location: &str) -> Option<BusType> {
        self.buses
            .iter()
            .find(|b| b.has_peripheral(location))
            .map(|b| b.bus_type())
    }

    fn matching_buses(&self, filter: BusType) -> Vec<Arc<dyn PeripheralBus>> {
        self.buses
            .iter()
            .filter(|b| filter.accepts(b.bus_type()))
            .cloned()
            .collect()
    }
}

pub struct PeripheralManager {
    config: RegistryConfig,
    host: Arc<dyn Host>,
    factories: Vec<BusFactory>,
    state: Mutex<RegistryState>,
    events: Mutex<RegistryEventBus>,
}

impl PeripheralManager {
    /// A registry with no buses. Events are forwarded to `host` as toasts.
    pub fn new(config: RegistryConfig, host: Arc<dyn Host>) -> Self {
        let mut events = RegistryEventBus::new();
        events.add_listener(HostNotifier::new(Arc::clone(&host)), EventFilter::All, None);
        Self {
            config,
            host,
            factories: Vec::new(),
            state: Mutex::new(RegistryState::new(0)),
            events: Mutex::new(events),
        }
    }

    /// Register a bus factory. Buses are created in registration order.
    pub fn with_bus(
        mut self,
        factory: impl Fn() -> Arc<dyn PeripheralBus> + Send + Sync + 'static,
    ) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    /// Register one shared bus instance, reused across restarts.
    pub fn with_bus_instance<B: PeripheralBus + 'static>(self, bus: Arc<B>) -> Self {
        self.with_bus(move || Arc::clone(&bus) as Arc<dyn PeripheralBus>)
    }

    /// Register the built-in buses enabled by the configuration.
    pub fn with_default_buses(self) -> Self {
        #[cfg(feature = "hid")]
        if self.config.buses.usb {
            return self.with_bus(|| {
                Arc::new(crate::bus::usb::UsbBus::new()) as Arc<dyn PeripheralBus>
            });
        }
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn is_initialised(&self) -> bool {
        self.phase() == Phase::Initialised
    }

    /// Load the mapping table, bring up the buses and run a first scan.
    ///
    /// Does nothing once started. A malformed mapping document is the only
    /// error; the registry then stays uninitialised. Buses are initialised
    /// last-registered first and a bus that fails is dropped.
    pub fn initialise(&self) -> Result<(), RegistryError> {
        let buses = {
            let mut state = self.state.lock();
            if state.phase != Phase::Uninitialised {
                return Ok(());
            }

            if let Err(e) = self.host.create_directory(&self.config.data_dir) {
                tracing::warn!(
                    path = %self.config.data_dir.display(),
                    error = %e,
                    "failed to create peripheral data folder"
                );
            }

            let mappings = MappingTable::load(&self.config.mapping_file)?;
            tracing::debug!(rules = mappings.len(), "mapping table loaded");

            let mut buses: Vec<Arc<dyn PeripheralBus>> =
                self.factories.iter().map(|factory| factory()).collect();
            for index in (0..buses.len()).rev() {
                if !buses[index].initialise() {
                    tracing::error!(bus = %buses[index].bus_type(), "failed to initialise bus");
                    buses.remove(index);
                }
            }

            state.mappings = Arc::new(mappings);
            state.buses = buses.clone();
            state.phase = Phase::Started;
            buses
        };

        for bus in &buses {
            bus.trigger_device_scan(self);
        }

        let mut state = self.state.lock();
        if state.phase == Phase::Started {
            state.phase = Phase::Initialised;
        }
        Ok(())
    }

    /// Release every bus (and with them every peripheral) and the mapping
    /// table. `initialise` may be called again afterwards.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let generation = state.generation + 1;
        let old = std::mem::replace(&mut *state, RegistryState::new(generation));
        // Under the lock, so an in-flight scan cannot register into a
        // released bus.
        for bus in &old.buses {
            bus.shutdown();
        }
    }

    fn buses(&self, filter: BusType) -> Vec<Arc<dyn PeripheralBus>> {
        self.state.lock().matching_buses(filter)
    }

    /// Scan every bus, or only the bus of type `filter` (`Unknown` = all).
    pub fn trigger_device_scan(&self, filter: BusType) {
        let mut buses = self.buses(filter);
        if filter != BusType::Unknown {
            buses.truncate(1);
        }
        for bus in buses {
            bus.trigger_device_scan(self);
        }
    }

    pub fn get_bus_by_type(&self, bus_type: BusType) -> Option<Arc<dyn PeripheralBus>> {
        self.state
            .lock()
            .buses
            .iter()
            .find(|b| b.bus_type() == bus_type)
            .cloned()
    }

    /// First peripheral at `location` on a bus accepted by `filter`.
    pub fn get_peripheral_at_location(
        &self,
        location: &str,
        filter: BusType,
    ) -> Option<PeripheralHandle> {
        self.buses(filter)
            .iter()
            .find_map(|bus| bus.get_peripheral(location))
    }

    pub fn has_peripheral_at_location(&self, location: &str, filter: BusType) -> bool {
        self.get_peripheral_at_location(location, filter).is_some()
    }

    pub fn get_bus_with_device(&self, location: &str) -> Option<Arc<dyn PeripheralBus>> {
        self.buses(BusType::Unknown)
            .into_iter()
            .find(|bus| bus.has_peripheral(location))
    }

    /// Append every peripheral exposing `feature` to `results`; returns how many were added.
    pub fn get_peripherals_with_feature(
        &self,
        results: &mut Vec<PeripheralHandle>,
        feature: Feature,
        filter: BusType,
    ) -> usize {
        self.buses(filter)
            .iter()
            .map(|bus| bus.get_peripherals_with_feature(results, feature))
            .sum()
    }

    pub fn has_peripheral_with_feature(&self, feature: Feature, filter: BusType) -> bool {
        let mut dummy = Vec::new();
        self.get_peripherals_with_feature(&mut dummy, feature, filter) > 0
    }

    pub fn number_of_peripherals(&self) -> usize {
        self.buses(BusType::Unknown)
            .iter()
            .map(|bus| bus.number_of_peripherals())
            .sum()
    }

    /// Whether CEC adapters can be built at all.
    pub fn supports_cec(&self) -> bool {
        self.config.capabilities.cec
    }

    /// Classify `result`, build the peripheral, initialise it and register it
    /// with `bus`.
    ///
    /// Returns `None` (and registers nothing) when no rule matches, when the
    /// resolved type cannot be built here, when initialisation fails, when
    /// any bus already has a peripheral at that location, or when `bus` is not
    /// (or no longer) one of this registry's buses.
    pub fn create_peripheral(
        &self,
        bus: &dyn PeripheralBus,
        result: &ScanResult,
    ) -> Option<PeripheralHandle> {
        let mut mapped = result.clone();
        if mapped.bus_type == BusType::Unknown {
            mapped.bus_type = bus.bus_type();
        }

        let (resolution, generation) = {
            let mut state = self.state.lock();
            let resolution = state.mappings.resolve(bus.bus_type(), &mapped)?;

            if resolution.peripheral_type == PeripheralType::Cec && !self.supports_cec() {
                let first = !state.cec_warning_shown;
                state.cec_warning_shown = true;
                drop(state);
                if first {
                    tracing::warn!(
                        location = %mapped.location,
                        "CEC support is not available, so the CEC adapter cannot be used"
                    );
                    self.emit(RegistryEvent::CapabilityMissing {
                        capability: Feature::Cec,
                        location: mapped.location.clone(),
                    });
                }
                return None;
            }
            (resolution, state.generation)
        };
        resolution.apply_to(&mut mapped);

        if resolution.peripheral_type == PeripheralType::Cec && bus.bus_type() != BusType::Cec {
            tracing::debug!(
                bus = %bus.bus_type(),
                location = %mapped.location,
                "CEC adapters are only created on the CEC bus"
            );
            return None;
        }

        let kind = PeripheralKind::for_type(resolution.peripheral_type)?;
        let mut peripheral = Peripheral::new(&mapped, kind);
        for (key, spec) in resolution.settings {
            peripheral.add_setting(key, spec);
        }

        if !peripheral.initialise() {
            tracing::debug!(location = %mapped.location, "failed to initialise peripheral");
            return None;
        }

        let event = RegistryEvent::DeviceAdded {
            bus: peripheral.bus_type(),
            location: peripheral.location().to_string(),
            name: peripheral.device_name().to_string(),
            peripheral_type: peripheral.peripheral_type(),
        };
        let handle = {
            let state = self.state.lock();
            if state.generation != generation || !state.owns(bus) {
                tracing::debug!(
                    bus = %bus.bus_type(),
                    location = %mapped.location,
                    "bus was released before registration"
                );
                return None;
            }
            if let Some(holder) = state.bus_holding(&mapped.location) {
                tracing::debug!(
                    bus = %bus.bus_type(),
                    holder = %holder,
                    location = %mapped.location,
                    "location already registered"
                );
                return None;
            }
            bus.register(peripheral)?
        };
        self.emit(event);
        Some(handle)
    }

    /// Announce that `bus` dropped `peripheral`.
    ///
    /// The handle must not be locked by the caller; listeners may lock it.
    pub fn on_device_deleted(&self, bus: BusType, peripheral: &PeripheralHandle) {
        let event = {
            let peripheral = peripheral.lock();
            RegistryEvent::DeviceRemoved {
                bus,
                location: peripheral.location().to_string(),
                name: peripheral.device_name().to_string(),
                peripheral_type: peripheral.peripheral_type(),
            }
        };
        self.emit(event);
    }

    fn cec_peripherals(&self) -> Vec<PeripheralHandle> {
        let mut handles = Vec::new();
        if self.supports_cec() {
            self.get_peripherals_with_feature(&mut handles, Feature::Cec, BusType::Unknown);
        }
        handles
    }

    /// Toggle mute on the first CEC adapter with audio control.
    pub fn toggle_mute(&self) -> bool {
        self.cec_peripherals().iter().any(|handle| {
            handle
                .lock()
                .as_cec_mut()
                .is_some_and(|cec| cec.toggle_mute())
        })
    }

    pub fn is_muted(&self) -> bool {
        self.cec_peripherals()
            .iter()
            .any(|handle| handle.lock().as_cec().is_some_and(|cec| cec.is_muted()))
    }

    /// Apply `mode` to every CEC adapter, or only to the `index`th one when
    /// `index` is non-zero. Returns the result of the last adapter acted on.
    pub fn toggle_device_state(&self, mode: CecStateChange, index: usize) -> bool {
        let mut ret = false;
        for handle in self.cec_peripherals().iter().skip(index) {
            if let Some(cec) = handle.lock().as_cec_mut() {
                ret = cec.toggle_device_state(mode);
            }
            if index != 0 {
                break;
            }
        }
        ret
    }

    /// Pending remote button of the first CEC adapter that has one.
    pub fn get_next_keypress(&self, frame_time: Duration) -> Option<Keypress> {
        self.cec_peripherals().iter().find_map(|handle| {
            let mut peripheral = handle.lock();
            let cec = peripheral.as_cec_mut()?;
            if !cec.has_pending_button() {
                return None;
            }
            cec.take_keypress(frame_time)
        })
    }

    /// Serve mute and volume actions through CEC. Returns `true` when handled.
    pub fn on_action(&self, action: &Action) -> bool {
        let up = match action.id {
            ActionId::Mute => return self.toggle_mute(),
            ActionId::VolumeUp => true,
            ActionId::VolumeDown => false,
            ActionId::Other(_) => return false,
        };
        if action.amount == 0.0 {
            return false;
        }

        for handle in self.cec_peripherals() {
            let mut peripheral = handle.lock();
            let Some(cec) = peripheral.as_cec_mut() else {
                continue;
            };
            if cec.has_audio_control() {
                if up {
                    cec.volume_up();
                } else {
                    cec.volume_down();
                }
                return true;
            }
        }
        false
    }

    /// React to a host setting change.
    pub fn on_setting_changed(&self, setting_id: &str) {
        if setting_id != LANGUAGE_SETTING {
            return;
        }
        let mut handles = Vec::new();
        self.get_peripherals_with_feature(&mut handles, Feature::Cec, BusType::Unknown);
        for handle in handles {
            handle
                .lock()
                .set_setting(USE_TV_MENU_LANGUAGE, SettingValue::Bool(false));
        }
    }

    /// React to a host settings action (a button in the settings UI).
    pub fn on_setting_action(&self, setting_id: &str) {
        if setting_id == PERIPHERALS_ACTION {
            self.host.open_peripheral_manager();
        }
    }

    /// List peripherals under `peripherals://<bus>/`, where `<bus>` may be `all`.
    pub fn get_directory(&self, path: &str, items: &mut Vec<DirectoryItem>) {
        let Some(segment) = bus_segment(path) else {
            return;
        };
        for bus in self.buses(BusType::Unknown) {
            if segment == ALL_BUSES || segment == bus.bus_type().as_str() {
                bus.get_directory(path, items);
            }
        }
    }

    /// Resolve `peripherals://<bus>/<location>.dev`. The bus must be named.
    pub fn get_by_path(&self, path: &str) -> Option<PeripheralHandle> {
        let segment = bus_segment(path)?;
        let bus = self
            .buses(BusType::Unknown)
            .into_iter()
            .find(|bus| segment == bus.bus_type().as_str())?;
        bus.get_by_path(path)
    }

    pub fn add_listener(
        &self,
        listener: impl RegistryListener + 'static,
        filter: EventFilter,
        tag: Option<String>,
    ) -> u64 {
        self.events.lock().add_listener(listener, filter, tag)
    }

    pub fn remove_listener(&self, id: u64) -> bool {
        self.events.lock().remove_listener(id)
    }

    pub fn set_listener_enabled(&self, id: u64, enabled: bool) {
        let mut events = self.events.lock();
        if enabled {
            events.enable(id);
        } else {
            events.disable(id);
        }
    }

    fn emit(&self, event: RegistryEvent) {
        self.events.lock().emit_all(std::slice::from_ref(&event));
    }

    /// Copy of every registered peripheral.
    pub fn snapshot(&self) -> Snapshot {
        let infos = self
            .buses(BusType::Unknown)
            .iter()
            .flat_map(|bus| bus.core().handles())
            .map(|handle| PeripheralInfo::from(&*handle.lock()))
            .collect();
        Snapshot(infos)
    }
}

impl Drop for PeripheralManager {
    fn drop(&mut self) {
        self.clear();
    }
}
