//! Section identities, JSON keys and compiled-in defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::{RelayDefault, SystemConfig};

/// A parsed section document.  Roots are always JSON objects.
pub type Document = Map<String, Value>;

// ── Keys ──────────────────────────────────────────────────────

pub const KEY_SSID_STA: &str = "SSID_STA";
pub const KEY_PSK_STA: &str = "PSK_STA";
pub const KEY_SSID_AP: &str = "SSID_AP";
pub const KEY_PSK_AP: &str = "PSK_AP";

pub const KEY_AUTO_WATERING: &str = "AUTO_WATERING";
pub const KEY_AUTO_CHANGE: &str = "AUTO_CHANGE";
/// Unix seconds of the last scheduled watering start.
pub const KEY_LAST_WATERING: &str = "LAST_WATERING";

/// Prefix of relay table keys; the suffix is the GPIO number.
pub const RELAY_KEY_PREFIX: &str = "switch";

/// Relay table key for a pin, e.g. `switch13`.
pub fn relay_key(pin: u8) -> String {
    format!("{}{}", RELAY_KEY_PREFIX, pin)
}

/// One relay table entry as stored on flash.
pub fn relay_entry(id: u8, pin: u8, label: &str, status: bool) -> Value {
    json!({ "id": id, "name": label, "pin": pin, "status": status })
}

// ── Section ───────────────────────────────────────────────────

/// One independently stored JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Wifi,
    Relay,
    State,
}

impl Section {
    pub const ALL: [Self; 3] = [Self::Wifi, Self::Relay, Self::State];

    /// Fixed file path of the section.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Wifi => "/config/wifi.json",
            Self::Relay => "/config/relay.json",
            Self::State => "/config/state.json",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Relay => "relay",
            Self::State => "state",
        }
    }
}

impl core::fmt::Display for Section {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Typed views ───────────────────────────────────────────────

/// Typed view of the wifi section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    #[serde(rename = "SSID_STA", default)]
    pub ssid_sta: String,
    #[serde(rename = "PSK_STA", default)]
    pub psk_sta: String,
    #[serde(rename = "SSID_AP", default)]
    pub ssid_ap: String,
    #[serde(rename = "PSK_AP", default)]
    pub psk_ap: String,
}

// ── Defaults ──────────────────────────────────────────────────

/// Documents written when a section is missing, corrupt or reset.
#[derive(Debug, Clone)]
pub struct StoreDefaults {
    pub relays: Vec<RelayDefault>,
    pub flags: bool,
    pub ap_ssid: String,
    pub ap_psk: String,
}

impl StoreDefaults {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            relays: config.relays.iter().cloned().collect(),
            flags: config.default_flags,
            ap_ssid: config.default_ap_ssid.as_str().into(),
            ap_psk: config.default_ap_psk.as_str().into(),
        }
    }

    /// Default document for `section`.
    pub fn document(&self, section: Section) -> Document {
        let mut doc = Document::new();
        match section {
            Section::Wifi => {
                doc.insert(KEY_SSID_STA.into(), Value::from(""));
                doc.insert(KEY_PSK_STA.into(), Value::from(""));
                doc.insert(KEY_SSID_AP.into(), Value::from(self.ap_ssid.as_str()));
                doc.insert(KEY_PSK_AP.into(), Value::from(self.ap_psk.as_str()));
            }
            Section::Relay => {
                for r in &self.relays {
                    doc.insert(relay_key(r.pin), relay_entry(r.id, r.pin, &r.label, false));
                }
            }
            Section::State => {
                doc.insert(KEY_AUTO_WATERING.into(), Value::Bool(self.flags));
                doc.insert(KEY_AUTO_CHANGE.into(), Value::Bool(self.flags));
                doc.insert(KEY_LAST_WATERING.into(), Value::from(0u64));
            }
        }
        doc
    }

    /// Default value for a single key, if the section defines one.
    pub fn value(&self, section: Section, key: &str) -> Option<Value> {
        self.document(section).remove(key)
    }
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}
