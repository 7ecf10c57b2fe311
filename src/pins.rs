//! GPIO / peripheral pin assignments for the MicroBox controller board.
//!
//! Relay output pins are not listed here: they live in the relay table of
//! the config store so they can be remapped at runtime.  The defaults
//! written on first boot come from [`SystemConfig::relays`](crate::config::SystemConfig).

use crate::adapters::hardware::SoilCalibration;

// ---------------------------------------------------------------------------
// GPIO ranges (classic ESP32)
// ---------------------------------------------------------------------------

/// Highest GPIO number on the ESP32.
pub const MAX_GPIO: u8 = 39;

/// Highest pin that can drive a relay.  GPIO34-39 are input-only.
pub const MAX_OUTPUT_GPIO: u8 = 33;

// ---------------------------------------------------------------------------
// Sensors: analog (ADC1)
// ---------------------------------------------------------------------------

/// Capacitive soil-moisture probe.  ADC1 channel 6.
pub const SOIL_ADC_GPIO: u8 = 34;

/// Resistive rain-sensor plate.  ADC1 channel 7.
pub const RAIN_ADC_GPIO: u8 = 35;

/// Full-scale reading of the 12-bit ADC at 12 dB attenuation.
pub const ADC_FULL_SCALE: u16 = 4095;

/// Bench calibration of the v1.2 soil probe (falls as moisture rises).
pub const SOIL_CALIBRATION: SoilCalibration = SoilCalibration { dry: 3000, wet: 1200 };
