//! Durable JSON configuration store.
//!
//! One file per [`Section`] on the flash filesystem.  Every public getter
//! and setter is built on [`ConfigStore::update_section`] or
//! [`ConfigStore::read`]; nothing else touches the files.
//!
//! # Guarantees
//!
//! - A section either parses to a JSON object or reads as
//!   [`StoreError::NotFound`]; corrupt files are never partially merged.
//! - Writes go to `<path>.tmp` first and are renamed over the target, so a
//!   reader never observes a half-written document.
//! - One mutex guards the filesystem for the whole store.  A read blocks a
//!   concurrent write and vice versa.  Acquisition is bounded by the
//!   configured [`LockPolicy`].

pub mod section;

use std::sync::{Mutex, MutexGuard};

use log::{info, log, warn};
use serde_json::Value;
use serde_json::error::Category;

use crate::app::ports::{FilesystemPort, FsError};
use crate::error::{Absence, JsonFault, StoreError};
use crate::sync::{LockPolicy, acquire};

pub use section::{
    Document, KEY_AUTO_CHANGE, KEY_AUTO_WATERING, KEY_LAST_WATERING, Section, StoreDefaults,
    WifiCredentials,
};

use section::{KEY_PSK_AP, KEY_PSK_STA, KEY_SSID_AP, KEY_SSID_STA};

/// Largest section file accepted; larger files read as out-of-memory.
pub const MAX_SECTION_BYTES: usize = 2048;

pub struct ConfigStore<F> {
    fs: Mutex<F>,
    policy: LockPolicy,
    defaults: StoreDefaults,
}

impl<F: FilesystemPort> ConfigStore<F> {
    pub fn new(fs: F, defaults: StoreDefaults, policy: LockPolicy) -> Self {
        Self {
            fs: Mutex::new(fs),
            policy,
            defaults,
        }
    }

    pub fn defaults(&self) -> &StoreDefaults {
        &self.defaults
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.policy
    }

    /// Write defaults for every section that is missing or unreadable.
    /// Returns the number of sections (re)initialised.
    pub fn bootstrap(&self) -> Result<usize, StoreError> {
        let mut fs = self.lock()?;
        let mut created = 0;
        for section in Section::ALL {
            if let Err(StoreError::NotFound(why)) = read_locked(&*fs, section) {
                info!("ConfigStore: initialising {} ({})", section, why);
                write_locked(&mut *fs, section, &self.defaults.document(section))?;
                created += 1;
            }
        }
        Ok(created)
    }

    // ── Core operations ───────────────────────────────────────

    /// Parse a section.  Absent, empty and malformed files all yield
    /// [`StoreError::NotFound`]; the caller applies defaults.
    pub fn read(&self, section: Section) -> Result<Document, StoreError> {
        let fs = self.lock()?;
        read_locked(&*fs, section)
    }

    /// Atomically replace a section's contents.
    pub fn write(&self, section: Section, doc: &Document) -> Result<(), StoreError> {
        let mut fs = self.lock()?;
        write_locked(&mut *fs, section, doc)
    }

    /// Read (or default), mutate, write back, all under one lock hold.
    pub fn update_section<R>(
        &self,
        section: Section,
        mutator: impl FnOnce(&mut Document) -> R,
    ) -> Result<R, StoreError> {
        let mut fs = self.lock()?;
        let mut doc = match read_locked(&*fs, section) {
            Ok(doc) => doc,
            Err(StoreError::NotFound(_)) => self.defaults.document(section),
            Err(e) => return Err(e),
        };
        let out = mutator(&mut doc);
        write_locked(&mut *fs, section, &doc)?;
        Ok(out)
    }

    /// Section contents, or its defaults when absent.  Never writes.
    pub fn read_or_default(&self, section: Section) -> Result<Document, StoreError> {
        match self.read(section) {
            Err(StoreError::NotFound(_)) => Ok(self.defaults.document(section)),
            other => other,
        }
    }

    /// Rewrite a section with its compiled-in defaults.
    pub fn reset_section(&self, section: Section) -> Result<(), StoreError> {
        info!("ConfigStore: resetting {} to defaults", section);
        self.write(section, &self.defaults.document(section))
    }

    // ── Key/value helpers ─────────────────────────────────────

    pub fn set_value(&self, section: Section, key: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        let value = value.into();
        self.update_section(section, |doc| {
            doc.insert(key.into(), value);
        })
    }

    /// Boolean flag lookup.  A missing or malformed section is rewritten
    /// with defaults; a missing key is filled in from the defaults.
    pub fn read_flag(&self, section: Section, key: &str) -> Result<bool, StoreError> {
        let mut fs = self.lock()?;
        let mut doc = match read_locked(&*fs, section) {
            Ok(doc) => doc,
            Err(StoreError::NotFound(why)) => {
                warn!("ConfigStore: {} unusable ({}), restoring defaults", section, why);
                let doc = self.defaults.document(section);
                write_locked(&mut *fs, section, &doc)?;
                doc
            }
            Err(e) => return Err(e),
        };

        if let Some(flag) = doc.get(key).and_then(Value::as_bool) {
            return Ok(flag);
        }

        let fallback = self.defaults.value(section, key).unwrap_or(Value::Bool(false));
        let flag = fallback.as_bool().unwrap_or(false);
        doc.insert(key.into(), Value::Bool(flag));
        write_locked(&mut *fs, section, &doc)?;
        Ok(flag)
    }

    // ── Typed accessors ───────────────────────────────────────

    pub fn wifi_credentials(&self) -> Result<WifiCredentials, StoreError> {
        let doc = self.read_or_default(Section::Wifi)?;
        Ok(serde_json::from_value(Value::Object(doc)).unwrap_or_else(|e| {
            warn!("ConfigStore: wifi section has wrong types ({}), using defaults", e);
            serde_json::from_value(Value::Object(self.defaults.document(Section::Wifi))).unwrap_or_default()
        }))
    }

    pub fn set_wifi_sta(&self, ssid: &str, psk: &str) -> Result<(), StoreError> {
        self.update_section(Section::Wifi, |doc| {
            doc.insert(KEY_SSID_STA.into(), ssid.into());
            doc.insert(KEY_PSK_STA.into(), psk.into());
        })
    }

    pub fn set_wifi_ap(&self, ssid: &str, psk: &str) -> Result<(), StoreError> {
        self.update_section(Section::Wifi, |doc| {
            doc.insert(KEY_SSID_AP.into(), ssid.into());
            doc.insert(KEY_PSK_AP.into(), psk.into());
        })
    }

    /// Unix seconds of the last automatic watering, 0 if never.
    pub fn last_watering(&self) -> Result<u64, StoreError> {
        let doc = self.read_or_default(Section::State)?;
        Ok(doc.get(KEY_LAST_WATERING).and_then(Value::as_u64).unwrap_or(0))
    }

    pub fn set_last_watering(&self, unix: u64) -> Result<(), StoreError> {
        self.set_value(Section::State, KEY_LAST_WATERING, unix)
    }

    // ── Internals ─────────────────────────────────────────────

    fn lock(&self) -> Result<MutexGuard<'_, F>, StoreError> {
        acquire(&self.fs, self.policy, "ConfigStore").ok_or_else(|| {
            warn!("ConfigStore: lock busy after {:?}", self.policy.max_wait());
            StoreError::LockTimeout
        })
    }
}

/// Parse raw section bytes, classifying why a section is unusable.
pub fn classify(bytes: &[u8]) -> Result<Document, Absence> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(Absence::Empty);
    }
    if bytes.len() > MAX_SECTION_BYTES {
        return Err(Absence::Malformed(JsonFault::OutOfMemory));
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(_) => Err(Absence::Malformed(JsonFault::NotAnObject)),
        Err(e) => Err(Absence::Malformed(match e.classify() {
            Category::Eof => JsonFault::Truncated,
            Category::Io | Category::Syntax | Category::Data => JsonFault::Syntax,
        })),
    }
}

fn read_locked<F: FilesystemPort>(fs: &F, section: Section) -> Result<Document, StoreError> {
    let bytes = match fs.read(section.path()) {
        Ok(bytes) => bytes,
        Err(FsError::NotFound) => return Err(StoreError::NotFound(Absence::Missing)),
        Err(e) => {
            warn!("ConfigStore: read {} failed: {}", section.path(), e);
            return Err(StoreError::Io(e));
        }
    };
    classify(&bytes).map_err(|why| {
        let err = StoreError::NotFound(why);
        log!(err.severity().level(), "ConfigStore: {} {}", section.path(), err);
        err
    })
}

fn write_locked<F: FilesystemPort>(fs: &mut F, section: Section, doc: &Document) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(doc).map_err(|_| StoreError::Encode)?;
    if bytes.len() > MAX_SECTION_BYTES {
        log::error!(
            "ConfigStore: {} is {} bytes, limit {}",
            section.path(),
            bytes.len(),
            MAX_SECTION_BYTES
        );
        return Err(StoreError::Encode);
    }

    let path = section.path();
    let tmp = format!("{}.tmp", path);
    fs.write(&tmp, &bytes).inspect_err(|e| {
        log::error!("ConfigStore: write {} failed: {}", tmp, e);
    })?;

    if let Err(e) = fs.rename(&tmp, path) {
        warn!("ConfigStore: rename {} failed ({}), rewriting in place", tmp, e);
        fs.remove(path)?;
        fs.write(path, &bytes)?;
        let _ = fs.remove(&tmp);
    }
    Ok(())
}
