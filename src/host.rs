//! Host application services consumed by the registry.
//!
//! The registry does not own a UI. It asks the [`Host`] to create its data
//! folder, to look up localized strings, to show notifications and to
//! refresh or open the peripheral settings window. [`HostNotifier`] turns
//! registry events into those calls.

use crate::events::{RegistryEvent, RegistryListener};
use std::io;
use std::path::Path;
use std::sync::Arc;

/// String id: "Device added".
pub const MSG_DEVICE_ADDED: u32 = 35005;
/// String id: "Device removed".
pub const MSG_DEVICE_REMOVED: u32 = 35006;
/// String id: "CEC adapter".
pub const MSG_CEC_TITLE: u32 = 36000;
/// String id: "libCEC support is not available".
pub const MSG_CEC_UNAVAILABLE: u32 = 36017;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

pub trait Host: Send + Sync {
    fn create_directory(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    /// Localized string for `id`.
    fn localize(&self, id: u32) -> String;

    /// Show a toast.
    fn notify(&self, level: NotificationLevel, title: &str, body: &str);

    /// The peripheral list changed; redraw any open settings window.
    fn refresh_settings_ui(&self) {}

    fn open_peripheral_manager(&self) {}
}

/// Headless host: no folder, no strings, no UI.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHost;

impl Host for NullHost {
    fn create_directory(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn localize(&self, id: u32) -> String {
        id.to_string()
    }

    fn notify(&self, _level: NotificationLevel, _title: &str, _body: &str) {}
}

/// Registry listener forwarding events to the host UI.
pub struct HostNotifier {
    host: Arc<dyn Host>,
}

impl HostNotifier {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }
}

impl RegistryListener for HostNotifier {
    fn on_event(&mut self, event: &RegistryEvent) {
        match event {
            RegistryEvent::DeviceAdded { name, .. } => {
                self.host.refresh_settings_ui();
                let title = self.host.localize(MSG_DEVICE_ADDED);
                self.host.notify(NotificationLevel::Info, &title, name);
            }
            RegistryEvent::DeviceRemoved { name, .. } => {
                self.host.refresh_settings_ui();
                let title = self.host.localize(MSG_DEVICE_REMOVED);
                self.host.notify(NotificationLevel::Info, &title, name);
            }
            RegistryEvent::CapabilityMissing { .. } => {
                let title = self.host.localize(MSG_CEC_TITLE);
                let body = self.host.localize(MSG_CEC_UNAVAILABLE);
                self.host.notify(NotificationLevel::Warning, &title, &body);
            }
        }
    }
}
