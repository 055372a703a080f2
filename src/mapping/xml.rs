//! Mapping document parser.
//!
//! ```xml
//! <peripherals>
//!   <peripheral vendor_product="2548:1001,2548:1002" bus="usb" name="Pulse-Eight CEC Adapter" mapTo="cec">
//!     <setting key="enabled" type="bool" value="1" label="305" />
//!     <setting key="standby_pc_on_tv_standby" type="enum" value="13011" lvalues="36028|13005|13011" label="36029" />
//!   </peripheral>
//! </peripherals>
//! ```
//!
//! Only direct `<peripheral>` children of the root and direct `<setting>`
//! children of a `<peripheral>` are read; anything else is skipped.
//!
//! Damage is contained per entry: a malformed `vendor:product` pair drops
//! that pair, a setting with no key or an enum with no options drops that
//! setting. Only a malformed document or a wrong root element fails the load.

use super::MappingRule;
use crate::error::MappingError;
use crate::scan::DeviceIdentity;
use crate::setting::{SettingKind, SettingSpec};
use crate::types::{parse_float_lenient, parse_hex_id, parse_int_lenient, BusType, PeripheralType};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

const ROOT_TAG: &str = "peripherals";
const RULE_TAG: &[u8] = b"peripheral";
const SETTING_TAG: &[u8] = b"setting";

/// Parse the rules of a mapping document, in declaration order.
pub fn parse_rules(raw: &str) -> Result<Vec<MappingRule>, MappingError> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut rules = Vec::new();
    let mut active: Option<MappingRule> = None;
    let mut saw_root = false;
    // Number of currently open elements.
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| MappingError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(element) => {
                visit(&element, depth, &mut saw_root, &mut active)?;
                depth += 1;
            }
            Event::Empty(element) => {
                visit(&element, depth, &mut saw_root, &mut active)?;
                // Self-closing <peripheral/> has no settings; finish it now.
                if depth == 1 && element.name().as_ref() == RULE_TAG {
                    if let Some(rule) = active.take() {
                        finish_rule(rule, &mut rules);
                    }
                }
            }
            Event::End(element) => {
                depth = depth.saturating_sub(1);
                if depth == 1 && element.name().as_ref() == RULE_TAG {
                    if let Some(rule) = active.take() {
                        finish_rule(rule, &mut rules);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(MappingError::InvalidRoot { found: None });
    }
    Ok(rules)
}

fn visit(
    element: &BytesStart<'_>,
    depth: usize,
    saw_root: &mut bool,
    active: &mut Option<MappingRule>,
) -> Result<(), MappingError> {
    let name = element.name();
    let tag = name.as_ref();

    match depth {
        0 => {
            let tag = String::from_utf8_lossy(tag);
            if !tag.eq_ignore_ascii_case(ROOT_TAG) {
                tracing::error!(root = %tag, "mapping document does not contain <peripherals>");
                return Err(MappingError::InvalidRoot {
                    found: Some(tag.into_owned()),
                });
            }
            *saw_root = true;
        }
        1 if tag == RULE_TAG => {
            *active = Some(parse_rule(&attributes(element)));
        }
        2 if tag == SETTING_TAG => {
            if let Some(rule) = active.as_mut() {
                let attrs = attributes(element);
                if let Some((key, spec)) = parse_setting(&rule.name, &attrs) {
                    rule.settings.insert(key, spec);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn finish_rule(rule: MappingRule, rules: &mut Vec<MappingRule>) {
    tracing::debug!(name = %rule.name, "loaded mapping rule");
    rules.push(rule);
}

fn attributes(element: &BytesStart<'_>) -> HashMap<String, String> {
    element
        .attributes()
        .with_checks(false)
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect()
}

fn parse_rule(attrs: &HashMap<String, String>) -> MappingRule {
    let name = attrs.get("name").cloned().unwrap_or_default();
    let identities = attrs
        .get("vendor_product")
        .map(|raw| parse_identities(&name, raw))
        .unwrap_or_default();

    let lookup = |key: &str| attrs.get(key).map(String::as_str).unwrap_or("");

    MappingRule {
        identities,
        bus: BusType::from_name(lookup("bus")),
        class: PeripheralType::from_name(lookup("class")),
        map_to: PeripheralType::from_name(lookup("mapTo")),
        settings: Default::default(),
        name,
    }
}

/// `"VVVV:PPPP,VVVV:PPPP"`. Pairs without exactly two tokens are dropped,
/// empty entries included.
fn parse_identities(rule_name: &str, raw: &str) -> Vec<DeviceIdentity> {
    let mut out = Vec::new();
    for pair in raw.split(',').map(str::trim) {
        let tokens: Vec<&str> = pair.split(':').collect();
        match tokens.as_slice() {
            [vendor, product] => out.push(DeviceIdentity::new(
                parse_hex_id(vendor),
                parse_hex_id(product),
            )),
            _ => {
                tracing::warn!(rule = %rule_name, pair = %pair, "ignoring invalid vendor_product entry");
            }
        }
    }
    out
}

/// `no`, `false` and `0` are false; anything else is true.
fn truthy(raw: &str) -> bool {
    !matches!(raw, "no" | "false" | "0")
}

fn parse_setting(rule_name: &str, attrs: &HashMap<String, String>) -> Option<(String, SettingSpec)> {
    let key = attrs.get("key").map(|k| k.trim()).unwrap_or("");
    if key.is_empty() {
        tracing::warn!(rule = %rule_name, "ignoring setting without a key");
        return None;
    }

    let get = |name: &str| attrs.get(name).map(String::as_str);
    let int_or = |name: &str, fallback: i32| get(name).map(parse_int_lenient).unwrap_or(fallback);
    let float_or = |name: &str| get(name).map(parse_float_lenient).unwrap_or(0.0);

    let label = int_or("label", -1);
    let configurable = get("configurable").map_or(true, |v| v.is_empty() || truthy(v));

    let kind = match get("type").unwrap_or("") {
        "bool" => SettingKind::Bool {
            default: get("value").is_some_and(truthy),
        },
        "int" => SettingKind::Int {
            default: int_or("value", 0),
            min: int_or("min", 0),
            step: int_or("step", 1),
            max: int_or("max", 255),
            format: get("format").unwrap_or("").to_string(),
        },
        "float" => SettingKind::Float {
            default: float_or("value"),
            min: float_or("min"),
            step: float_or("step"),
            max: float_or("max"),
        },
        "enum" => {
            let options: Vec<(i32, i32)> = get("lvalues")
                .unwrap_or("")
                .split('|')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| {
                    let v = parse_int_lenient(v);
                    (v, v)
                })
                .collect();
            if options.is_empty() {
                tracing::warn!(rule = %rule_name, key = %key, "ignoring enum setting without lvalues");
                return None;
            }
            SettingKind::Enum {
                default: int_or("value", 0),
                options,
            }
        }
        _ => SettingKind::String {
            default: get("value").unwrap_or("").to_string(),
        },
    };

    Some((
        key.to_string(),
        SettingSpec::new(kind)
            .with_label(label)
            .with_configurable(configurable),
    ))
}
