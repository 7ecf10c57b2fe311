//! System configuration parameters
//!
//! Board profile, relay defaults and automation tuning for the MicroBox
//! controller.  Compiled-in defaults match the two-relay ESP32 DevKit board.

use serde::{Deserialize, Serialize};

use crate::relay::Polarity;
use crate::sync::LockPolicy;

/// Maximum number of relay channels a board can expose.
pub const MAX_RELAYS: usize = 4;

/// Relay channel as written on first boot or after a table reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDefault {
    pub id: u8,
    pub pin: u8,
    pub label: heapless::String<24>,
}

impl RelayDefault {
    pub fn new(id: u8, pin: u8, label: &str) -> Self {
        Self {
            id,
            pin,
            label: fixed_str(label),
        }
    }
}

/// Which trigger policy drives the watering automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomationVariant {
    /// Soil-moisture hysteresis.
    Threshold,
    /// Fixed daily window with an interval and rain check.
    Scheduled,
}

/// Hour and minute of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    pub const fn seconds(self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60
    }

    pub const fn is_valid(self) -> bool {
        self.hour < 24 && self.minute < 60
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Board ---
    /// Relay board signal polarity, fixed at boot.
    pub polarity: Polarity,
    /// Channels written when the relay table is missing.
    pub relays: heapless::Vec<RelayDefault, MAX_RELAYS>,
    /// Value of AUTO_WATERING / AUTO_CHANGE when the state section is created.
    pub default_flags: bool,
    /// Access point name used until credentials are provisioned.
    pub default_ap_ssid: heapless::String<32>,
    pub default_ap_psk: heapless::String<64>,

    // --- Config store ---
    pub lock_policy: LockPolicy,

    // --- Scheduler ---
    /// Delay applied to automation relay actions (milliseconds)
    pub action_delay_ms: u64,
    /// Cooperative loop sleep between iterations (milliseconds)
    pub loop_interval_ms: u64,

    // --- Automation ---
    pub variant: AutomationVariant,
    /// Interval between dedup flag resets (milliseconds)
    pub dedup_reset_ms: u64,

    // --- Threshold variant ---
    /// Soil moisture (%) below which watering starts
    pub soil_min_percent: u8,
    /// Soil moisture (%) above which watering stops
    pub soil_max_percent: u8,
    pub threshold_poll_ms: u64,

    // --- Scheduled variant ---
    pub start_time: TimeOfDay,
    pub stop_time: TimeOfDay,
    /// Minimum whole days between scheduled waterings
    pub interval_days: u32,
    /// Rain level (%) at or above which watering is cancelled
    pub rain_cancel_percent: u8,
    pub scheduled_poll_ms: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Board
            polarity: Polarity::ActiveLow, // optocoupler board
            relays: [
                RelayDefault::new(0, 13, "Relay 1"),
                RelayDefault::new(1, 14, "Relay 2"),
            ]
            .into_iter()
            .collect(),
            default_flags: false,
            default_ap_ssid: fixed_str("MicroBox"),
            default_ap_psk: fixed_str("microbox123"),

            // Config store
            lock_policy: LockPolicy::Retry {
                attempts: 50,
                backoff_ms: 2,
            },

            // Scheduler
            action_delay_ms: 1000,
            loop_interval_ms: 50,

            // Automation
            variant: AutomationVariant::Threshold,
            dedup_reset_ms: 60_000,

            // Threshold
            soil_min_percent: 20,
            soil_max_percent: 60,
            threshold_poll_ms: 5000,

            // Scheduled
            start_time: TimeOfDay::new(7, 0),
            stop_time: TimeOfDay::new(10, 0),
            interval_days: 2,
            rain_cancel_percent: 50,
            scheduled_poll_ms: 1000,
        }
    }
}

impl SystemConfig {
    /// Range-check every field that would otherwise produce a stuck or
    /// oscillating automation.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.relays.is_empty() {
            return Err("at least one relay channel is required");
        }
        for (i, a) in self.relays.iter().enumerate() {
            for b in &self.relays[i + 1..] {
                if a.id == b.id {
                    return Err("relay ids must be unique");
                }
                if a.pin == b.pin {
                    return Err("relay pins must be unique");
                }
            }
        }
        if self.soil_min_percent >= self.soil_max_percent {
            return Err("soil_min_percent must be < soil_max_percent");
        }
        if self.soil_max_percent > 100 || self.rain_cancel_percent > 100 {
            return Err("percent thresholds must be 0-100");
        }
        if !self.start_time.is_valid() || !self.stop_time.is_valid() {
            return Err("watering window must be a valid time of day");
        }
        if self.start_time == self.stop_time {
            return Err("start_time and stop_time must differ");
        }
        if self.threshold_poll_ms == 0 || self.scheduled_poll_ms == 0 || self.dedup_reset_ms == 0 {
            return Err("poll and dedup intervals must be non-zero");
        }
        if self.loop_interval_ms == 0 {
            return Err("loop_interval_ms must be non-zero");
        }
        Ok(())
    }

    /// Poll interval of the configured automation variant.
    pub fn poll_interval_ms(&self) -> u64 {
        match self.variant {
            AutomationVariant::Threshold => self.threshold_poll_ms,
            AutomationVariant::Scheduled => self.scheduled_poll_ms,
        }
    }
}

fn fixed_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
