//! Typed peripheral settings.
//!
//! A [`SettingSpec`] is what a mapping rule declares: the type, default value,
//! bounds, label and visibility of one setting. A [`Setting`] is a spec bound to
//! a current [`SettingValue`] on a live peripheral.
//!
//! ## Conventions
//! - `label` is a localized-string id; `-1` means "no label".
//! - `configurable = false` hides the setting from the management UI but it
//!   still applies.
//! - Enum settings store an integer value; `options` are `(value, label)` pairs
//!   in declaration order.

use serde::{Deserialize, Serialize};

/// Shape and default of one declared setting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SettingKind {
    Bool {
        default: bool,
    },
    Int {
        default: i32,
        min: i32,
        step: i32,
        max: i32,
        /// Display format hint, passed through to the UI untouched.
        format: String,
    },
    Float {
        default: f32,
        min: f32,
        step: f32,
        max: f32,
    },
    Enum {
        default: i32,
        options: Vec<(i32, i32)>,
    },
    String {
        default: String,
    },
}

/// A declared setting: kind plus presentation metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettingSpec {
    pub kind: SettingKind,
    /// Localized label id (`-1` when absent).
    pub label: i32,
    /// Whether the setting is shown in the management UI.
    pub configurable: bool,
}

impl SettingSpec {
    pub fn new(kind: SettingKind) -> Self {
        Self {
            kind,
            label: -1,
            configurable: true,
        }
    }

    pub fn with_label(mut self, label: i32) -> Self {
        self.label = label;
        self
    }

    pub fn with_configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }

    /// The declared default as a value.
    pub fn default_value(&self) -> SettingValue {
        match &self.kind {
            SettingKind::Bool { default } => SettingValue::Bool(*default),
            SettingKind::Int { default, .. } | SettingKind::Enum { default, .. } => {
                SettingValue::Int(*default)
            }
            SettingKind::Float { default, .. } => SettingValue::Float(*default),
            SettingKind::String { default } => SettingValue::String(default.clone()),
        }
    }

    /// Whether `value` has the right type and lies within the declared bounds.
    pub fn accepts(&self, value: &SettingValue) -> bool {
        match (&self.kind, value) {
            (SettingKind::Bool { .. }, SettingValue::Bool(_)) => true,
            (SettingKind::Int { min, max, .. }, SettingValue::Int(v)) => (*min..=*max).contains(v),
            (SettingKind::Float { min, max, .. }, SettingValue::Float(v)) => {
                // A zero-width range means "unbounded".
                v.is_finite() && (min >= max || (*min..=*max).contains(v))
            }
            (SettingKind::Enum { options, .. }, SettingValue::Int(v)) => {
                options.iter().any(|(value, _)| value == v)
            }
            (SettingKind::String { .. }, SettingValue::String(_)) => true,
            _ => false,
        }
    }
}

/// Current value of a setting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
}

/// A spec bound to its current value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub spec: SettingSpec,
    value: SettingValue,
}

impl Setting {
    /// Bind a spec, starting at its default.
    pub fn from_spec(spec: SettingSpec) -> Self {
        let value = spec.default_value();
        Self { spec, value }
    }

    pub fn value(&self) -> &SettingValue {
        &self.value
    }

    /// Replace the value if the spec accepts it. Returns `false` otherwise.
    pub fn set(&mut self, value: SettingValue) -> bool {
        if !self.spec.accepts(&value) {
            return false;
        }
        self.value = value;
        true
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            SettingValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.value {
            SettingValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self.value {
            SettingValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            SettingValue::String(v) => Some(v),
            _ => None,
        }
    }
}
