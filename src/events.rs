//! Registry events and their listener bus.
//!
//! The registry publishes an event whenever a peripheral is added or removed
//! and when a device needed a capability this build lacks. Listeners are
//! registered with a filter and an optional location tag; they can be muted
//! without being removed.

use crate::types::{BusType, Feature, PeripheralType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    DeviceAdded {
        bus: BusType,
        location: String,
        name: String,
        peripheral_type: PeripheralType,
    },
    DeviceRemoved {
        bus: BusType,
        location: String,
        name: String,
        peripheral_type: PeripheralType,
    },
    /// A device resolved to a type whose capability is not available.
    CapabilityMissing { capability: Feature, location: String },
}

impl RegistryEvent {
    /// Location of the device the event is about.
    pub fn location(&self) -> &str {
        match self {
            RegistryEvent::DeviceAdded { location, .. }
            | RegistryEvent::DeviceRemoved { location, .. }
            | RegistryEvent::CapabilityMissing { location, .. } => location,
        }
    }
}

/// Receives registry events.
///
/// Called with the registry's listener lock held and no other registry lock.
/// A listener may query the registry and lock peripheral handles, but it
/// must not add, remove or toggle listeners.
pub trait RegistryListener: Send {
    fn on_event(&mut self, event: &RegistryEvent);
}

/// Which events a listener wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    AddedOnly,
    RemovedOnly,
    Custom(fn(&RegistryEvent) -> bool),
}

impl EventFilter {
    fn passes(self, event: &RegistryEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::AddedOnly => matches!(event, RegistryEvent::DeviceAdded { .. }),
            EventFilter::RemovedOnly => matches!(event, RegistryEvent::DeviceRemoved { .. }),
            EventFilter::Custom(f) => f(event),
        }
    }
}

struct ListenerEntry {
    listener: Box<dyn RegistryListener>,
    enabled: bool,
    filter: EventFilter,
    tag: Option<String>, // location
}

/// Listener registry. Listeners are called in registration order.
pub struct RegistryEventBus {
    next_id: u64,
    listeners: BTreeMap<u64, ListenerEntry>,
}

impl Default for RegistryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryEventBus {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: BTreeMap::new(),
        }
    }

    /// Registers a listener with a filter and an optional location tag.
    pub fn add_listener(
        &mut self,
        listener: impl RegistryListener + 'static,
        filter: EventFilter,
        tag: Option<String>,
    ) -> u64 {
        self.add_boxed(Box::new(listener), filter, tag)
    }

    pub fn add_boxed(
        &mut self,
        listener: Box<dyn RegistryListener>,
        filter: EventFilter,
        tag: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener,
                enabled: true,
                filter,
                tag,
            },
        );
        self.next_id += 1;
        id
    }

    pub fn enable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = true;
        }
    }

    /// Mutes a listener without removing it.
    pub fn disable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = false;
        }
    }

    /// Returns `false` when no listener has that id.
    pub fn remove_listener(&mut self, id: u64) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn emit(&mut self, event: &RegistryEvent) {
        for entry in self.listeners.values_mut() {
            if !entry.enabled {
                continue;
            }
            if let Some(ref wanted) = entry.tag {
                if event.location() != wanted {
                    continue;
                }
            }
            if entry.filter.passes(event) {
                entry.listener.on_event(event);
            }
        }
    }

    pub fn emit_all(&mut self, events: &[RegistryEvent]) {
        for event in events {
            self.emit(event);
        }
    }
}
