use crate::events::{RegistryEvent, RegistryListener};

/// A listener that writes every registry event to the `tracing` log.
#[derive(Debug, Default)]
pub struct LogListener;

impl LogListener {
    pub fn new() -> Self {
        LogListener
    }
}

impl RegistryListener for LogListener {
    fn on_event(&mut self, event: &RegistryEvent) {
        match event {
            RegistryEvent::DeviceAdded {
                bus,
                location,
                name,
                peripheral_type,
            } => tracing::info!(%bus, %location, %name, %peripheral_type, "peripheral added"),
            RegistryEvent::DeviceRemoved {
                bus,
                location,
                name,
                peripheral_type,
            } => tracing::info!(%bus, %location, %name, %peripheral_type, "peripheral removed"),
            RegistryEvent::CapabilityMissing {
                capability,
                location,
            } => tracing::warn!(%capability, %location, "capability not available"),
        }
    }
}
