//! Classified, initialised device instances.
//!
//! A [`Peripheral`] is built from a resolved [`ScanResult`] and carries the
//! common identity (bus, ids, location, friendly name), the settings merged
//! from every matching mapping rule, and a [`PeripheralKind`] holding the
//! per-kind state. The set of kinds is closed: adding one means adding a
//! variant here and a constructor arm in [`PeripheralKind::for_type`].
//!
//! Peripherals are shared as [`PeripheralHandle`]s. The bus that registered a
//! peripheral owns it; every other holder is a borrower.

mod cec;

pub use cec::{CecAdapter, CecCommand, CecStateChange};

use crate::scan::ScanResult;
use crate::setting::{Setting, SettingSpec, SettingValue};
use crate::types::{BusType, Feature, PeripheralType};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared handle to a registered peripheral.
pub type PeripheralHandle = Arc<Mutex<Peripheral>>;

/// Setting holding a HID device's custom keymap name.
pub const KEYMAP_SETTING: &str = "keymap";
/// Setting that switches a CEC adapter on or off.
pub const CEC_ENABLED_SETTING: &str = "enabled";

/// State shared by the HID-like kinds (plain HID, dual-mode remotes, IR receivers).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HidState {
    keymap: Option<String>,
}

impl HidState {
    /// Custom keymap picked up from the `keymap` setting at initialise.
    pub fn keymap(&self) -> Option<&str> {
        self.keymap.as_deref()
    }
}

/// Per-kind state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeripheralKind {
    Hid(HidState),
    Nic,
    Disk,
    /// Dual-mode remote: a HID keyboard that is also a remote.
    Nyxboard(HidState),
    Tuner,
    Bluetooth,
    Cec(CecAdapter),
    /// Infrared receiver exposed through HID.
    Imon(HidState),
}

impl PeripheralKind {
    /// Fresh state for a resolved type. `Unknown` has no kind.
    ///
    /// Whether the type may actually be built (e.g. CEC support compiled in,
    /// right bus) is the registry's decision, not this constructor's.
    pub fn for_type(ty: PeripheralType) -> Option<Self> {
        Some(match ty {
            PeripheralType::Hid => PeripheralKind::Hid(HidState::default()),
            PeripheralType::Nic => PeripheralKind::Nic,
            PeripheralType::Disk => PeripheralKind::Disk,
            PeripheralType::Nyxboard => PeripheralKind::Nyxboard(HidState::default()),
            PeripheralType::Tuner => PeripheralKind::Tuner,
            PeripheralType::Bluetooth => PeripheralKind::Bluetooth,
            PeripheralType::Cec => PeripheralKind::Cec(CecAdapter::new()),
            PeripheralType::Imon => PeripheralKind::Imon(HidState::default()),
            PeripheralType::Unknown => return None,
        })
    }

    pub fn peripheral_type(&self) -> PeripheralType {
        match self {
            PeripheralKind::Hid(_) => PeripheralType::Hid,
            PeripheralKind::Nic => PeripheralType::Nic,
            PeripheralKind::Disk => PeripheralType::Disk,
            PeripheralKind::Nyxboard(_) => PeripheralType::Nyxboard,
            PeripheralKind::Tuner => PeripheralType::Tuner,
            PeripheralKind::Bluetooth => PeripheralType::Bluetooth,
            PeripheralKind::Cec(_) => PeripheralType::Cec,
            PeripheralKind::Imon(_) => PeripheralType::Imon,
        }
    }

    pub fn features(&self) -> Vec<Feature> {
        match self {
            PeripheralKind::Hid(_) => vec![Feature::Hid],
            PeripheralKind::Nic => vec![Feature::Nic],
            PeripheralKind::Disk => vec![Feature::Disk],
            PeripheralKind::Nyxboard(_) => vec![Feature::Hid, Feature::Nyxboard],
            PeripheralKind::Tuner => vec![Feature::Tuner],
            PeripheralKind::Bluetooth => vec![Feature::Bluetooth],
            PeripheralKind::Cec(_) => vec![Feature::Cec],
            PeripheralKind::Imon(_) => vec![Feature::Hid, Feature::Imon],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Peripheral {
    bus_type: BusType,
    device_class: PeripheralType,
    vendor_id: u16,
    product_id: u16,
    location: String,
    friendly_name: String,
    settings: BTreeMap<String, Setting>,
    features: Vec<Feature>,
    initialised: bool,
    kind: PeripheralKind,
}

impl Peripheral {
    pub fn new(result: &ScanResult, kind: PeripheralKind) -> Self {
        Self {
            bus_type: result.bus_type,
            device_class: result.device_class,
            vendor_id: result.vendor_id,
            product_id: result.product_id,
            location: result.location.clone(),
            friendly_name: result.friendly_name.clone().unwrap_or_default(),
            settings: BTreeMap::new(),
            features: kind.features(),
            initialised: false,
            kind,
        }
    }

    pub fn bus_type(&self) -> BusType {
        self.bus_type
    }

    /// Class the bus reported during the scan.
    pub fn device_class(&self) -> PeripheralType {
        self.device_class
    }

    /// Type the peripheral was constructed as.
    pub fn peripheral_type(&self) -> PeripheralType {
        self.kind.peripheral_type()
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn device_name(&self) -> &str {
        &self.friendly_name
    }

    /// Virtual path of this peripheral: `peripherals://<bus>/<location>.dev`.
    pub fn file_location(&self) -> String {
        format!(
            "{}{}/{}.dev",
            crate::bus::PATH_SCHEME,
            self.bus_type,
            self.location
        )
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn kind(&self) -> &PeripheralKind {
        &self.kind
    }

    pub fn as_cec(&self) -> Option<&CecAdapter> {
        match &self.kind {
            PeripheralKind::Cec(adapter) => Some(adapter),
            _ => None,
        }
    }

    pub fn as_cec_mut(&mut self) -> Option<&mut CecAdapter> {
        match &mut self.kind {
            PeripheralKind::Cec(adapter) => Some(adapter),
            _ => None,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Bring up every feature. Calling it again after success is a no-op.
    pub fn initialise(&mut self) -> bool {
        if self.initialised {
            return true;
        }

        for feature in self.features.clone() {
            if !self.initialise_feature(feature) {
                tracing::debug!(
                    location = %self.location,
                    feature = %feature,
                    "failed to initialise feature"
                );
                return false;
            }
        }

        self.initialised = true;
        true
    }

    fn initialise_feature(&mut self, feature: Feature) -> bool {
        match feature {
            Feature::Hid => {
                let keymap = self
                    .string_setting(KEYMAP_SETTING)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string);
                if let PeripheralKind::Hid(state)
                | PeripheralKind::Nyxboard(state)
                | PeripheralKind::Imon(state) = &mut self.kind
                {
                    state.keymap = keymap;
                }
                true
            }
            Feature::Cec => {
                let enabled = self.bool_setting(CEC_ENABLED_SETTING).unwrap_or(true);
                match &mut self.kind {
                    PeripheralKind::Cec(adapter) => adapter.open(&self.location, enabled),
                    _ => false,
                }
            }
            _ => true,
        }
    }

    /// Add (or replace) a setting, starting at its declared default.
    pub fn add_setting(&mut self, key: impl Into<String>, spec: SettingSpec) {
        self.settings.insert(key.into(), Setting::from_spec(spec));
    }

    pub fn has_setting(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    pub fn setting(&self, key: &str) -> Option<&Setting> {
        self.settings.get(key)
    }

    pub fn settings(&self) -> impl Iterator<Item = (&String, &Setting)> {
        self.settings.iter()
    }

    /// Visible settings in key order, for the management UI.
    pub fn configurable_settings(&self) -> impl Iterator<Item = (&String, &Setting)> {
        self.settings.iter().filter(|(_, s)| s.spec.configurable)
    }

    /// Change a setting's value.
    ///
    /// Returns `false` for an unknown key, a type mismatch, an out-of-range
    /// number or an undeclared enum value.
    pub fn set_setting(&mut self, key: &str, value: SettingValue) -> bool {
        match self.settings.get_mut(key) {
            Some(setting) => setting.set(value),
            None => false,
        }
    }

    pub fn bool_setting(&self, key: &str) -> Option<bool> {
        self.settings.get(key).and_then(Setting::as_bool)
    }

    pub fn int_setting(&self, key: &str) -> Option<i32> {
        self.settings.get(key).and_then(Setting::as_int)
    }

    pub fn float_setting(&self, key: &str) -> Option<f32> {
        self.settings.get(key).and_then(Setting::as_float)
    }

    pub fn string_setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Setting::as_str)
    }
}
