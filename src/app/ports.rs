//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ConfigStore / ActionScheduler / WateringAutomation
//! ```
//!
//! Driven adapters (GPIO, flash filesystem, clocks, sensors, event sinks)
//! implement these traits.  The domain core consumes them via generics or
//! `&mut dyn` call-site parameters and never touches hardware directly.

use embedded_hal::digital::PinState;

// ───────────────────────────────────────────────────────────────
// GPIO port (driven adapter: domain ↔ pins)
// ───────────────────────────────────────────────────────────────

/// Abstracted physical I/O.
pub trait GpioPort {
    /// Drive an output pin to `level`.
    fn set_level(&mut self, pin: u8, level: PinState) -> Result<(), GpioError>;

    /// Raw ADC sample from an analog-capable pin.
    fn read_analog(&mut self, pin: u8) -> Result<u16, GpioError>;

    /// Current logic level of a pin.
    fn read_digital(&mut self, pin: u8) -> Result<PinState, GpioError>;
}

// ───────────────────────────────────────────────────────────────
// Filesystem port (driven adapter: domain ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Flash-backed hierarchical store holding one file per config section.
///
/// Implementations need not be atomic; [`ConfigStore`](crate::store::ConfigStore)
/// layers write-then-rename on top.
pub trait FilesystemPort {
    /// Whole-file read.  `Err(FsError::NotFound)` if the path does not exist.
    fn read(&self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Create or truncate `path` and write `data`.
    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FsError>;

    fn exists(&self, path: &str) -> bool;

    /// Delete a file.  Returns `Ok(())` even if it didn't exist.
    fn remove(&mut self, path: &str) -> Result<(), FsError>;

    /// Move `from` over `to`, replacing any existing file.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError>;
}

// ───────────────────────────────────────────────────────────────
// Clock ports
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond counter used for due times and poll gating.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
}

/// Calendar time for the scheduled watering variant.
pub trait WallClockPort {
    /// `None` while the RTC/NTP source has not produced a valid time.
    fn local_time(&self) -> Option<LocalTime>;
}

/// Local wall-clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// Seconds since the Unix epoch.
    pub unix: u64,
    pub hour: u8,
    pub minute: u8,
}

impl LocalTime {
    /// Build from unix seconds, treating the clock as UTC.
    pub const fn from_unix(unix: u64) -> Self {
        let secs_of_day = unix % 86_400;
        Self {
            unix,
            hour: (secs_of_day / 3600) as u8,
            minute: ((secs_of_day % 3600) / 60) as u8,
        }
    }

    /// Unix time of today's midnight in this clock's local frame.
    pub const fn midnight(&self) -> u64 {
        let into_day = self.hour as u64 * 3600 + self.minute as u64 * 60 + self.unix % 60;
        self.unix.saturating_sub(into_day)
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Scaled environmental readings.  Raw acquisition lives in the adapter.
pub trait SensorPort {
    /// Soil moisture 0–100 %, `None` if the sensor is unavailable.
    fn soil_moisture_percent(&mut self) -> Option<u8>;

    /// Rain level 0–100 %, `None` if no rain sensor is fitted.
    fn rain_level_percent(&mut self) -> Option<u8>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`FilesystemPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Requested path does not exist.
    NotFound,
    /// Flash partition is full.
    Full,
    /// Filesystem not mounted.
    NotMounted,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`GpioPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    /// Pin number is not usable on this board.
    InvalidPin(u8),
    /// Driver call returned an error code.
    Driver(i32),
}

impl core::fmt::Display for FsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::Full => write!(f, "filesystem full"),
            Self::NotMounted => write!(f, "filesystem not mounted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for GpioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "invalid pin {}", pin),
            Self::Driver(rc) => write!(f, "driver error (rc={})", rc),
        }
    }
}
