//! Mock adapters for integration tests.
//!
//! Records every pin write so tests can assert on the full switching
//! history without touching real GPIO registers.  Time is injected through
//! shared atomics so the service and the test body see the same clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use embedded_hal::digital::PinState;
use microbox::adapters::fs::MemFs;
use microbox::app::events::AppEvent;
use microbox::app::ports::{
    ClockPort, EventSink, FilesystemPort, FsError, GpioError, GpioPort, LocalTime, SensorPort,
    WallClockPort,
};
use microbox::config::SystemConfig;
use microbox::store::{ConfigStore, StoreDefaults};
use microbox::sync::LockPolicy;

// ── MockClock ─────────────────────────────────────────────────

/// Monotonic clock shared between the scheduler and the test.
#[derive(Clone, Default)]
pub struct MockClock(Arc<AtomicU64>);

#[allow(dead_code)]
impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) -> u64 {
        self.0.fetch_add(ms, Ordering::SeqCst) + ms
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl ClockPort for MockClock {
    fn now_ms(&self) -> u64 {
        self.get()
    }
}

// ── MockWallClock ─────────────────────────────────────────────

/// Settable UTC wall clock; `None` models an unsynced RTC.
#[derive(Default)]
pub struct MockWallClock {
    unix: Option<u64>,
}

#[allow(dead_code)]
impl MockWallClock {
    pub fn at(unix: u64) -> Self {
        Self { unix: Some(unix) }
    }

    pub fn unsynced() -> Self {
        Self { unix: None }
    }

    pub fn set(&mut self, unix: u64) {
        self.unix = Some(unix);
    }
}

impl WallClockPort for MockWallClock {
    fn local_time(&self) -> Option<LocalTime> {
        self.unix.map(LocalTime::from_unix)
    }
}

// ── MockBoard ─────────────────────────────────────────────────

/// Sensors plus GPIO in one value, like the real `HardwareAdapter`.
#[derive(Default)]
pub struct MockBoard {
    pub soil: Option<u8>,
    pub rain: Option<u8>,
    pub writes: Vec<(u8, PinState)>,
    pub levels: HashMap<u8, PinState>,
    /// Pins whose writes fail with a driver error.
    pub broken: Vec<u8>,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_soil(soil: u8) -> Self {
        Self {
            soil: Some(soil),
            ..Self::default()
        }
    }

    pub fn level(&self, pin: u8) -> Option<PinState> {
        self.levels.get(&pin).copied()
    }
}

impl GpioPort for MockBoard {
    fn set_level(&mut self, pin: u8, level: PinState) -> Result<(), GpioError> {
        if self.broken.contains(&pin) {
            return Err(GpioError::Driver(-1));
        }
        self.writes.push((pin, level));
        self.levels.insert(pin, level);
        Ok(())
    }

    fn read_analog(&mut self, _pin: u8) -> Result<u16, GpioError> {
        Ok(0)
    }

    fn read_digital(&mut self, pin: u8) -> Result<PinState, GpioError> {
        Ok(self.level(pin).unwrap_or(PinState::Low))
    }
}

impl SensorPort for MockBoard {
    fn soil_moisture_percent(&mut self) -> Option<u8> {
        self.soil
    }

    fn rain_level_percent(&mut self) -> Option<u8> {
        self.rain
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, event: &AppEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Fresh in-memory store with the given config's defaults.
#[allow(dead_code)]
pub fn memory_store(config: &SystemConfig) -> Arc<ConfigStore<MemFs>> {
    Arc::new(ConfigStore::new(
        MemFs::new(),
        StoreDefaults::from_config(config),
        LockPolicy::FailFast,
    ))
}

/// Store over a pre-populated filesystem.
#[allow(dead_code)]
pub fn store_over(fs: MemFs, config: &SystemConfig) -> Arc<ConfigStore<MemFs>> {
    Arc::new(ConfigStore::new(fs, StoreDefaults::from_config(config), config.lock_policy))
}

// ── FlakyFs ───────────────────────────────────────────────────

/// `MemFs` whose reads can be made to fail with `FsError::IoError`.
/// The switch is shared so a test can flip it after the store owns the fs.
#[allow(dead_code)]
pub struct FlakyFs {
    inner: MemFs,
    fail_reads: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl FlakyFs {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let fail_reads = Arc::new(AtomicBool::new(false));
        let fs = Self {
            inner: MemFs::new(),
            fail_reads: Arc::clone(&fail_reads),
        };
        (fs, fail_reads)
    }
}

impl FilesystemPort for FlakyFs {
    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(FsError::IoError);
        }
        self.inner.read(path)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FsError> {
        self.inner.write(path, data)
    }

    fn exists(&self, path: &str) -> bool {
        self.inner.exists(path)
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        self.inner.remove(path)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        self.inner.rename(from, to)
    }
}

/// Store over a `FlakyFs`, plus the switch that breaks its reads.
#[allow(dead_code)]
pub fn flaky_store(config: &SystemConfig) -> (Arc<ConfigStore<FlakyFs>>, Arc<AtomicBool>) {
    let (fs, fail_reads) = FlakyFs::new();
    let store = Arc::new(ConfigStore::new(
        fs,
        StoreDefaults::from_config(config),
        LockPolicy::FailFast,
    ));
    (store, fail_reads)
}
