//! Relay channel registry.
//!
//! Maps a logical channel id to the attributes persisted in the relay
//! section (`switch<pin>` → `{id, name, pin, status}`) and owns the board
//! polarity, which is fixed when the registry is constructed.

use std::sync::Arc;

use embedded_hal::digital::PinState;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::ports::{FilesystemPort, GpioPort};
use crate::config::RelayDefault;
use crate::error::StoreError;
use crate::store::section::{RELAY_KEY_PREFIX, relay_entry, relay_key};
use crate::store::{ConfigStore, Document, Section};

/// Relay board signal polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// Coil energised on a high pin.
    ActiveHigh,
    /// Opto-isolated boards: coil energised on a low pin.
    ActiveLow,
}

impl Polarity {
    pub const fn level(self, on: bool) -> PinState {
        match (self, on) {
            (Self::ActiveHigh, true) | (Self::ActiveLow, false) => PinState::High,
            (Self::ActiveHigh, false) | (Self::ActiveLow, true) => PinState::Low,
        }
    }

    /// Inverse of [`level`](Self::level).
    pub const fn is_on(self, level: PinState) -> bool {
        matches!(
            (self, level),
            (Self::ActiveHigh, PinState::High) | (Self::ActiveLow, PinState::Low)
        )
    }
}

/// Resolved view of one relay channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u8,
    /// `None` when the channel is absent from the relay table.
    pub pin: Option<u8>,
    pub label: String,
    pub state: bool,
}

impl ChannelInfo {
    /// Sentinel returned by [`RelayRegistry::resolve`] for unknown channels.
    pub fn unresolved(id: u8) -> Self {
        Self {
            id,
            pin: None,
            label: String::new(),
            state: false,
        }
    }

    pub const fn is_resolved(&self) -> bool {
        self.pin.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct RelayEntry {
    id: u8,
    #[serde(default)]
    name: String,
    pin: u8,
    #[serde(default)]
    status: bool,
}

impl From<RelayEntry> for ChannelInfo {
    fn from(e: RelayEntry) -> Self {
        Self {
            id: e.id,
            pin: Some(e.pin),
            label: e.name,
            state: e.status,
        }
    }
}

fn entries(doc: &Document) -> impl Iterator<Item = (&String, RelayEntry)> {
    doc.iter()
        .filter(|(k, _)| k.starts_with(RELAY_KEY_PREFIX))
        .filter_map(|(k, v)| serde_json::from_value::<RelayEntry>(v.clone()).ok().map(|e| (k, e)))
}

fn key_of(doc: &Document, id: u8) -> Option<String> {
    entries(doc).find(|(_, e)| e.id == id).map(|(k, _)| k.clone())
}

pub struct RelayRegistry<F> {
    store: Arc<ConfigStore<F>>,
    polarity: Polarity,
}

impl<F: FilesystemPort> RelayRegistry<F> {
    pub fn new(store: Arc<ConfigStore<F>>, polarity: Polarity) -> Self {
        info!("RelayRegistry: polarity {:?}", polarity);
        Self { store, polarity }
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn store(&self) -> &Arc<ConfigStore<F>> {
        &self.store
    }

    /// Logical on/off to physical pin level.
    pub fn apply_polarity(&self, on: bool) -> PinState {
        self.polarity.level(on)
    }

    /// Look a channel up by numeric id.  Never fails; check
    /// [`ChannelInfo::is_resolved`].
    pub fn resolve(&self, id: u8) -> ChannelInfo {
        match self.store.read(Section::Relay) {
            Ok(doc) => entries(&doc)
                .find(|(_, e)| e.id == id)
                .map_or_else(|| ChannelInfo::unresolved(id), |(_, e)| e.into()),
            Err(e) => {
                warn!("RelayRegistry: relay table unavailable ({}), channel {} unresolved", e, id);
                ChannelInfo::unresolved(id)
            }
        }
    }

    /// Look a channel up by its `switch<pin>` alias.
    pub fn resolve_pin(&self, pin: u8) -> Option<ChannelInfo> {
        let doc = self.store.read(Section::Relay).ok()?;
        let value = doc.get(&relay_key(pin))?;
        serde_json::from_value::<RelayEntry>(value.clone()).ok().map(Into::into)
    }

    /// All channels in the table, ordered by id.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let Ok(doc) = self.store.read(Section::Relay) else {
            return Vec::new();
        };
        let mut out: Vec<ChannelInfo> = entries(&doc).map(|(_, e)| e.into()).collect();
        out.sort_by_key(|c| c.id);
        out
    }

    /// Replace the relay table with `channels`, all switched off.
    pub fn initialize_defaults(&self, channels: &[RelayDefault]) -> Result<(), StoreError> {
        let mut doc = Document::new();
        for c in channels {
            doc.insert(relay_key(c.pin), relay_entry(c.id, c.pin, &c.label, false));
        }
        self.store.write(Section::Relay, &doc)?;
        info!("RelayRegistry: initialised {} channels", channels.len());
        Ok(())
    }

    /// Persist a channel's state.  `Ok(false)` if the channel is unknown.
    pub fn set_status(&self, id: u8, state: bool) -> Result<bool, StoreError> {
        self.update_entry(id, |entry| {
            entry.insert("status".into(), Value::Bool(state));
        })
    }

    pub fn set_label(&self, id: u8, label: &str) -> Result<bool, StoreError> {
        self.update_entry(id, |entry| {
            entry.insert("name".into(), Value::from(label));
        })
    }

    /// Move a channel to another GPIO, re-keying its entry.  `Ok(false)` if
    /// the channel is unknown or another channel already uses `pin`.
    pub fn set_pin(&self, id: u8, pin: u8) -> Result<bool, StoreError> {
        self.store.update_section(Section::Relay, |doc| {
            let Some(old_key) = key_of(doc, id) else {
                return false;
            };
            let new_key = relay_key(pin);
            if new_key != old_key && doc.contains_key(&new_key) {
                warn!("RelayRegistry: pin {} already assigned", pin);
                return false;
            }
            let Some(mut entry) = doc.remove(&old_key) else {
                return false;
            };
            if let Some(obj) = entry.as_object_mut() {
                obj.insert("pin".into(), Value::from(pin));
            }
            doc.insert(new_key, entry);
            true
        })
    }

    /// Drive every channel's pin to its persisted state.  Returns the number
    /// of pins written.
    pub fn restore(&self, gpio: &mut dyn GpioPort) -> usize {
        let mut restored = 0;
        for ch in self.channels() {
            let Some(pin) = ch.pin else { continue };
            match gpio.set_level(pin, self.apply_polarity(ch.state)) {
                Ok(()) => {
                    info!(
                        "RelayRegistry: restored '{}' (id={}, pin={}) -> {}",
                        ch.label,
                        ch.id,
                        pin,
                        if ch.state { "ON" } else { "OFF" }
                    );
                    restored += 1;
                }
                Err(e) => warn!("RelayRegistry: restore pin {} failed: {}", pin, e),
            }
        }
        restored
    }

    fn update_entry(
        &self,
        id: u8,
        f: impl FnOnce(&mut serde_json::Map<String, Value>),
    ) -> Result<bool, StoreError> {
        self.store.update_section(Section::Relay, |doc| {
            let Some(key) = key_of(doc, id) else {
                return false;
            };
            match doc.get_mut(&key).and_then(Value::as_object_mut) {
                Some(entry) => {
                    f(entry);
                    true
                }
                None => false,
            }
        })
    }
}
