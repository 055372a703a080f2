//! CEC adapter state.
//!
//! The wire protocol lives in the transport, outside this crate. The adapter
//! keeps the state the registry needs to answer mute/volume/power/keypress
//! requests and queues outgoing [`CecCommand`]s for the transport to drain
//! with [`CecAdapter::take_commands`]. The transport feeds state back through
//! [`set_audio_system_connected`](CecAdapter::set_audio_system_connected),
//! [`press_button`](CecAdapter::press_button) and
//! [`release_button`](CecAdapter::release_button).

use crate::input::Keypress;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Requested power transition for the devices behind an adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CecStateChange {
    #[default]
    Toggle,
    Activate,
    Standby,
}

/// Command queued for the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CecCommand {
    VolumeUp,
    VolumeDown,
    ToggleMute,
    PowerOn,
    Standby,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingButton {
    button: u32,
    held: Duration,
    released: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CecAdapter {
    port: Option<String>,
    enabled: bool,
    audio_system: bool,
    muted: bool,
    active: bool,
    pending: Option<PendingButton>,
    commands: Vec<CecCommand>,
}

impl CecAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the adapter to its port. Fails when there is no port to open.
    pub(crate) fn open(&mut self, port: &str, enabled: bool) -> bool {
        if port.is_empty() {
            return false;
        }
        self.port = Some(port.to_string());
        self.enabled = enabled;
        self.active = enabled;
        true
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// `false` when the mapping disabled the adapter; it is then kept idle.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_audio_system_connected(&mut self, connected: bool) {
        self.audio_system = connected;
    }

    /// An audio system that accepts volume/mute is reachable.
    pub fn has_audio_control(&self) -> bool {
        self.enabled && self.audio_system
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn toggle_mute(&mut self) -> bool {
        if !self.has_audio_control() {
            return false;
        }
        self.muted = !self.muted;
        self.commands.push(CecCommand::ToggleMute);
        true
    }

    pub fn volume_up(&mut self) -> bool {
        self.send_audio(CecCommand::VolumeUp)
    }

    pub fn volume_down(&mut self) -> bool {
        self.send_audio(CecCommand::VolumeDown)
    }

    fn send_audio(&mut self, command: CecCommand) -> bool {
        if !self.has_audio_control() {
            return false;
        }
        self.commands.push(command);
        true
    }

    /// Apply a power transition. Returns `true` when a command was issued.
    pub fn toggle_device_state(&mut self, mode: CecStateChange) -> bool {
        if !self.enabled {
            return false;
        }
        let standby = match mode {
            CecStateChange::Toggle => self.active,
            CecStateChange::Standby if self.active => true,
            CecStateChange::Activate if !self.active => false,
            _ => return false,
        };
        if standby {
            self.commands.push(CecCommand::Standby);
            self.active = false;
        } else {
            self.commands.push(CecCommand::PowerOn);
            self.active = true;
        }
        true
    }

    /// Transport: a remote button went down.
    pub fn press_button(&mut self, button: u32) {
        self.pending = Some(PendingButton {
            button,
            held: Duration::ZERO,
            released: false,
        });
    }

    /// Transport: a remote button came up after `held`.
    pub fn release_button(&mut self, button: u32, held: Duration) {
        self.pending = Some(PendingButton {
            button,
            held,
            released: true,
        });
    }

    pub fn has_pending_button(&self) -> bool {
        self.pending.is_some()
    }

    /// Hand out the pending button.
    ///
    /// A released button is reported once and cleared. A button still held is
    /// reported on every call (key repeat), its hold time advancing by
    /// `frame_time` each time.
    pub fn take_keypress(&mut self, frame_time: Duration) -> Option<Keypress> {
        let pending = self.pending.as_mut()?;
        let key = Keypress {
            button: pending.button,
            hold_time: pending.held,
        };
        if pending.released {
            self.pending = None;
        } else {
            pending.held += frame_time;
        }
        Some(key)
    }

    /// Drain queued commands, oldest first.
    pub fn take_commands(&mut self) -> Vec<CecCommand> {
        std::mem::take(&mut self.commands)
    }
}
