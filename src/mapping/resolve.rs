use super::MappingTable;
use crate::scan::ScanResult;
use crate::setting::SettingSpec;
use crate::types::{format_hex_id, BusType, PeripheralType};
use std::collections::BTreeMap;

/// Classification produced for one scan result.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// `map_to` of the first matching rule.
    pub peripheral_type: PeripheralType,
    /// `name` of the first matching rule.
    pub friendly_name: String,
    /// Union of every matching rule's settings, last match wins per key.
    pub settings: BTreeMap<String, SettingSpec>,
}

impl Resolution {
    /// Record the classification on the scan result.
    pub fn apply_to(&self, result: &mut ScanResult) {
        result.resolved_type = Some(self.peripheral_type);
        result.friendly_name = Some(self.friendly_name.clone());
    }
}

impl MappingTable {
    /// Classify `result` as seen on `bus`.
    ///
    /// Returns `None` when no rule matches; the caller must not construct a
    /// peripheral in that case.
    pub fn resolve(&self, bus: BusType, result: &ScanResult) -> Option<Resolution> {
        let mut matching = self.rules().iter().filter(|rule| rule.matches(bus, result));

        let first = matching.next()?;
        tracing::debug!(
            vendor = %format_hex_id(result.vendor_id),
            product = %format_hex_id(result.product_id),
            name = %first.name,
            mapped_to = %first.map_to,
            "device mapped"
        );

        let mut settings = first.settings.clone();
        for rule in matching {
            for (key, spec) in &rule.settings {
                settings.insert(key.clone(), spec.clone());
            }
        }

        Some(Resolution {
            peripheral_type: first.map_to,
            friendly_name: first.name.clone(),
            settings,
        })
    }
}
