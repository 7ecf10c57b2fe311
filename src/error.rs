//! Unified error types for the MicroBox firmware.
//!
//! Every subsystem error converts into the top-level [`Error`], keeping the
//! control loop's error handling uniform.  Store errors additionally carry a
//! [`Severity`] so callers can pick the log level without inspecting variants.

use core::fmt;

use crate::app::ports::{FsError, GpioError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A config section could not be read or written.
    Store(StoreError),
    /// A GPIO or ADC access failed.
    Gpio(GpioError),
    /// A relay channel is not present in the relay table.
    UnresolvedChannel(u8),
    /// Configuration failed validation.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Gpio(e) => write!(f, "gpio: {e}"),
            Self::UnresolvedChannel(id) => write!(f, "relay channel {id} not found"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<GpioError> for Error {
    fn from(e: GpioError) -> Self {
        Self::Gpio(e)
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How loudly a failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Expected on first boot, e.g. a section file that was never written.
    Info,
    /// Recovered by falling back to defaults.
    Warning,
    /// An operation was dropped.
    Error,
}

impl Severity {
    pub const fn level(self) -> log::Level {
        match self {
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Why a stored JSON document could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFault {
    /// Input ended in the middle of a value.
    Truncated,
    /// Document exceeds the section capacity.
    OutOfMemory,
    /// Invalid JSON syntax or an unexpected value type.
    Syntax,
    /// Valid JSON whose root is not an object.
    NotAnObject,
}

impl fmt::Display for JsonFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "input truncated"),
            Self::OutOfMemory => write!(f, "document too large"),
            Self::Syntax => write!(f, "invalid syntax"),
            Self::NotAnObject => write!(f, "root is not an object"),
        }
    }
}

/// The reasons a section reads as not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// No file at the section path.
    Missing,
    /// File exists but holds no content.
    Empty,
    /// File content failed to parse.
    Malformed(JsonFault),
}

impl fmt::Display for Absence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "file missing"),
            Self::Empty => write!(f, "file empty"),
            Self::Malformed(fault) => write!(f, "malformed JSON ({fault})"),
        }
    }
}

/// Errors from [`ConfigStore`](crate::store::ConfigStore) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The section is absent or unusable; the caller applies defaults.
    NotFound(Absence),
    /// The filesystem rejected a read or write.
    Io(FsError),
    /// The store lock could not be acquired within the retry budget.
    LockTimeout,
    /// The document could not be serialised.
    Encode,
}

impl StoreError {
    pub const fn severity(&self) -> Severity {
        match self {
            Self::NotFound(Absence::Missing) => Severity::Info,
            Self::NotFound(_) => Severity::Warning,
            Self::Io(_) | Self::LockTimeout | Self::Encode => Severity::Error,
        }
    }

    /// `true` when the caller should fall back to defaults.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(why) => write!(f, "section not found: {why}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::LockTimeout => write!(f, "lock acquisition timed out"),
            Self::Encode => write!(f, "failed to encode document"),
        }
    }
}

impl From<FsError> for StoreError {
    fn from(e: FsError) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
