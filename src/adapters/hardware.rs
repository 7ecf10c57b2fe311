//! Hardware adapter: owns the GPIO backend and scales analog sensor
//! readings for the automation.
//!
//! Implements both [`GpioPort`] (delegating) and [`SensorPort`] so the
//! control loop can hand one `&mut` to the automation and then to the
//! scheduler without a double borrow.

use embedded_hal::digital::PinState;
use log::warn;

use crate::app::ports::{GpioError, GpioPort, SensorPort};

/// Raw ADC calibration of the capacitive soil probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoilCalibration {
    /// Reading in dry air.
    pub dry: u16,
    /// Reading submerged in water.
    pub wet: u16,
}

/// Map a raw probe value onto 0–100 %, clamping outside the calibration.
/// Works for probes that rise or fall with moisture.
pub fn raw_to_moisture_percent(raw: u16, cal: SoilCalibration) -> u8 {
    let (dry, wet, raw) = (u32::from(cal.dry), u32::from(cal.wet), u32::from(raw));
    if dry == wet {
        return 0;
    }
    let percent = if wet > dry {
        raw.clamp(dry, wet).saturating_sub(dry) * 100 / (wet - dry)
    } else {
        dry.saturating_sub(raw.clamp(wet, dry)) * 100 / (dry - wet)
    };
    percent.min(100) as u8
}

/// Linear 0..=`full_scale` → 0..=100 mapping used for the rain sensor.
pub fn raw_to_percent(raw: u16, full_scale: u16) -> u8 {
    if full_scale == 0 {
        return 0;
    }
    (u32::from(raw.min(full_scale)) * 100 / u32::from(full_scale)) as u8
}

pub struct HardwareAdapter<G> {
    gpio: G,
    soil_pin: Option<u8>,
    rain_pin: Option<u8>,
    soil_cal: SoilCalibration,
    adc_full_scale: u16,
}

impl<G: GpioPort> HardwareAdapter<G> {
    pub fn new(gpio: G, soil_pin: Option<u8>, rain_pin: Option<u8>, soil_cal: SoilCalibration, adc_full_scale: u16) -> Self {
        Self {
            gpio,
            soil_pin,
            rain_pin,
            soil_cal,
            adc_full_scale,
        }
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }
}

impl<G: GpioPort> GpioPort for HardwareAdapter<G> {
    fn set_level(&mut self, pin: u8, level: PinState) -> Result<(), GpioError> {
        self.gpio.set_level(pin, level)
    }

    fn read_analog(&mut self, pin: u8) -> Result<u16, GpioError> {
        self.gpio.read_analog(pin)
    }

    fn read_digital(&mut self, pin: u8) -> Result<PinState, GpioError> {
        self.gpio.read_digital(pin)
    }
}

impl<G: GpioPort> SensorPort for HardwareAdapter<G> {
    fn soil_moisture_percent(&mut self) -> Option<u8> {
        let pin = self.soil_pin?;
        match self.gpio.read_analog(pin) {
            Ok(raw) => Some(raw_to_moisture_percent(raw, self.soil_cal)),
            Err(e) => {
                warn!("HardwareAdapter: soil read failed: {}", e);
                None
            }
        }
    }

    fn rain_level_percent(&mut self) -> Option<u8> {
        let pin = self.rain_pin?;
        match self.gpio.read_analog(pin) {
            Ok(raw) => Some(raw_to_percent(raw, self.adc_full_scale)),
            Err(e) => {
                warn!("HardwareAdapter: rain read failed: {}", e);
                None
            }
        }
    }
}
