//! Bus, peripheral and feature tags, plus their symbolic names.
//!
//! The mapping file and virtual paths refer to buses and peripheral types by
//! short lowercase names (`"usb"`, `"cec"`, `"hid"`, ...). [`BusType`] and
//! [`PeripheralType`] convert in both directions; an unrecognized name maps to
//! the `Unknown` sentinel, which rule filters treat as a wildcard.
//!
//! [`PeripheralType`] doubles as the *device class* reported by a bus during a
//! scan and as the *target type* a mapping rule resolves to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport a peripheral is reachable through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    /// Unset / any bus. Used as the wildcard in filters.
    #[default]
    Unknown,
    Usb,
    Pci,
    Rpi,
    Cec,
}

impl BusType {
    /// Every concrete bus type, in a stable order.
    pub const ALL: [BusType; 4] = [BusType::Usb, BusType::Pci, BusType::Rpi, BusType::Cec];

    /// Resolve a symbolic name (case-insensitive). Unknown names yield [`BusType::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "usb" => BusType::Usb,
            "pci" => BusType::Pci,
            "rpi" => BusType::Rpi,
            "cec" => BusType::Cec,
            _ => BusType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BusType::Unknown => "unknown",
            BusType::Usb => "usb",
            BusType::Pci => "pci",
            BusType::Rpi => "rpi",
            BusType::Cec => "cec",
        }
    }

    /// `true` when `self` is the wildcard or equal to `other`.
    #[inline]
    pub fn accepts(self, other: BusType) -> bool {
        self == BusType::Unknown || self == other
    }
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a peripheral.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeripheralType {
    #[default]
    Unknown,
    Hid,
    Nic,
    Disk,
    /// Dual-mode remote / keyboard.
    Nyxboard,
    Tuner,
    Bluetooth,
    /// CEC (infrared/HDMI control) adapter.
    Cec,
    /// iMON infrared receiver.
    Imon,
}

impl PeripheralType {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "bluetooth" => PeripheralType::Bluetooth,
            "cec" => PeripheralType::Cec,
            "disk" => PeripheralType::Disk,
            "hid" => PeripheralType::Hid,
            "nic" => PeripheralType::Nic,
            "nyxboard" => PeripheralType::Nyxboard,
            "tuner" => PeripheralType::Tuner,
            "imon" => PeripheralType::Imon,
            _ => PeripheralType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeripheralType::Unknown => "unknown",
            PeripheralType::Hid => "hid",
            PeripheralType::Nic => "nic",
            PeripheralType::Disk => "disk",
            PeripheralType::Nyxboard => "nyxboard",
            PeripheralType::Tuner => "tuner",
            PeripheralType::Bluetooth => "bluetooth",
            PeripheralType::Cec => "cec",
            PeripheralType::Imon => "imon",
        }
    }

    /// `true` when `self` is the wildcard or equal to `other`.
    #[inline]
    pub fn accepts(self, other: PeripheralType) -> bool {
        self == PeripheralType::Unknown || self == other
    }
}

impl fmt::Display for PeripheralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability tag used for cross-bus queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Hid,
    Nic,
    Disk,
    Nyxboard,
    Cec,
    Bluetooth,
    Tuner,
    Imon,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Hid => "hid",
            Feature::Nic => "nic",
            Feature::Disk => "disk",
            Feature::Nyxboard => "nyxboard",
            Feature::Cec => "cec",
            Feature::Bluetooth => "bluetooth",
            Feature::Tuner => "tuner",
            Feature::Imon => "imon",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a hex id such as `"045e"` or `"0x045E"`. Invalid input yields `0`.
pub fn parse_hex_id(raw: &str) -> u16 {
    let s = raw.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(s, 16).unwrap_or(0)
}

/// Four-digit uppercase hex, as used in logs and directory listings.
pub fn format_hex_id(id: u16) -> String {
    format!("{id:04X}")
}

/// Leading-integer parse: optional sign then digits, anything else stops the scan.
///
/// `"12px"` is `12`, `"abc"` is `0`. Overflow saturates.
pub(crate) fn parse_int_lenient(raw: &str) -> i32 {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Leading-float parse with the same forgiving behavior as [`parse_int_lenient`].
pub(crate) fn parse_float_lenient(raw: &str) -> f32 {
    let s = raw.trim();
    if let Ok(v) = s.parse::<f32>() {
        return v;
    }
    // Longest numeric prefix.
    let end = s
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    s[..end].parse::<f32>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_names_round_trip_and_unknown_is_wildcard() {
        for bus in BusType::ALL {
            assert_eq!(BusType::from_name(bus.as_str()), bus);
        }
        assert_eq!(BusType::from_name("USB"), BusType::Usb);
        assert_eq!(BusType::from_name("firewire"), BusType::Unknown);
        assert!(BusType::Unknown.accepts(BusType::Cec));
        assert!(!BusType::Usb.accepts(BusType::Cec));
    }

    #[test]
    fn peripheral_names_resolve() {
        assert_eq!(PeripheralType::from_name("nyxboard"), PeripheralType::Nyxboard);
        assert_eq!(PeripheralType::from_name("imon"), PeripheralType::Imon);
        assert_eq!(PeripheralType::from_name(""), PeripheralType::Unknown);
        assert!(PeripheralType::Unknown.accepts(PeripheralType::Disk));
    }

    #[test]
    fn hex_ids() {
        assert_eq!(parse_hex_id("abcd"), 0xabcd);
        assert_eq!(parse_hex_id(" 0x045E "), 0x045e);
        assert_eq!(parse_hex_id("zz"), 0);
        assert_eq!(format_hex_id(0x2548), "2548");
        assert_eq!(format_hex_id(0xab), "00AB");
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(parse_int_lenient("42"), 42);
        assert_eq!(parse_int_lenient("-7"), -7);
        assert_eq!(parse_int_lenient("12px"), 12);
        assert_eq!(parse_int_lenient("abc"), 0);
        assert_eq!(parse_int_lenient("99999999999"), i32::MAX);
        assert!((parse_float_lenient("0.5") - 0.5).abs() < f32::EPSILON);
        assert!((parse_float_lenient("1.25s") - 1.25).abs() < f32::EPSILON);
        assert!(parse_float_lenient("nope").abs() < f32::EPSILON);
    }
}
