//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (web handlers,
//! WebSocket clients, the boot button) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use crate::store::Section;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Switch a relay after `delay_ms`, optionally persisting the new state.
    SetRelay {
        channel: u8,
        state: bool,
        delay_ms: u64,
        persist: bool,
    },

    /// Enable or disable the watering automation.
    SetAutoWatering(bool),

    /// Enable or disable automatic WiFi mode switching.
    SetAutoModeChange(bool),

    /// Store station credentials.
    SetWifiSta { ssid: String, psk: String },

    /// Store access-point credentials.
    SetWifiAp { ssid: String, psk: String },

    /// Change a relay's display name.
    RenameRelay { channel: u8, label: String },

    /// Move a relay to a different GPIO.
    SetRelayPin { channel: u8, pin: u8 },

    /// Rewrite a section with its compiled-in defaults.
    ResetSection(Section),
}

/// Result of [`AppService::handle_command`](super::service::AppService::handle_command).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    Rejected(&'static str),
}

impl CommandOutcome {
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}
