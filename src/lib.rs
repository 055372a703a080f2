//! Peripherals: device registry for media-center style hosts.
//!
//! Buses enumerate attached devices, a declarative mapping table decides what
//! each device is, and the [`PeripheralManager`] builds, initialises and
//! tracks the resulting peripherals. CEC adapters additionally carry mute,
//! volume, power and remote-control keypresses into the host.
//!
//! ```no_run
//! use peripherals::{BusType, NullHost, PeripheralManager, RegistryConfig, ScanResult, VirtualBus};
//! use std::sync::Arc;
//!
//! let cec = Arc::new(VirtualBus::new(BusType::Cec));
//! let registry = PeripheralManager::new(RegistryConfig::default(), Arc::new(NullHost))
//!     .with_default_buses()
//!     .with_bus_instance(cec.clone());
//! registry.initialise().unwrap();
//!
//! cec.attach(ScanResult::new("/dev/cec0"));
//! registry.trigger_device_scan(BusType::Cec);
//! println!("{} peripheral(s)", registry.number_of_peripherals());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod input;
pub mod log_listener;
pub mod manager;
pub mod mapping;
pub mod peripheral;
pub mod scan;
pub mod setting;
pub mod snapshot;
pub mod types;

pub use bus::virtual_bus::VirtualBus;
pub use bus::{BusCore, DirectoryItem, PeripheralBus};
pub use config::RegistryConfig;
pub use error::{ConfigError, MappingError, RegistryError};
pub use events::{EventFilter, RegistryEvent, RegistryListener};
pub use host::{Host, NotificationLevel, NullHost};
pub use input::{Action, ActionId, Keypress};
pub use log_listener::LogListener;
pub use manager::{Phase, PeripheralManager};
pub use mapping::{MappingRule, MappingTable};
pub use peripheral::{CecAdapter, CecStateChange, Peripheral, PeripheralHandle, PeripheralKind};
pub use scan::{DeviceIdentity, ScanResult};
pub use setting::{Setting, SettingKind, SettingSpec, SettingValue};
pub use snapshot::{PeripheralInfo, Snapshot};
pub use types::{BusType, Feature, PeripheralType};

#[cfg(feature = "hid")]
pub use bus::usb::UsbBus;
