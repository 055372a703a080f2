//! Host input types routed through the registry.
//!
//! The host's input layer hands [`Action`]s to
//! [`PeripheralManager::on_action`](crate::manager::PeripheralManager::on_action)
//! so mute/volume can be served by a CEC-capable peripheral, and pulls remote
//! keypresses back out with
//! [`get_next_keypress`](crate::manager::PeripheralManager::get_next_keypress).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifier of a host action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionId {
    Mute,
    VolumeUp,
    VolumeDown,
    /// Any other host action, by its numeric id. Never handled here.
    Other(u32),
}

/// An input action with its analog amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    /// Analog amount; `0.0` means "no movement" and is ignored for volume.
    pub amount: f32,
}

impl Action {
    pub fn new(id: ActionId, amount: f32) -> Self {
        Self { id, amount }
    }
}

/// A remote-control button delivered by a peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypress {
    /// Host button code.
    pub button: u32,
    /// How long the button has been held so far.
    pub hold_time: Duration,
}
