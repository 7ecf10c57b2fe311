//! GPIO / ADC adapter.
//!
//! - **`target_os = "espidf"`**: raw ESP-IDF driver calls.  Output
//!   direction and ADC channels are configured lazily on first use.
//! - **`not(target_os = "espidf")`**: in-memory pin and ADC state for
//!   host simulation; analog inputs are injected with [`Esp32Gpio::set_analog`].

use embedded_hal::digital::PinState;

use crate::app::ports::{GpioError, GpioPort};
use crate::pins::MAX_GPIO;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;


/// ADC1 channel wired to a GPIO on the classic ESP32.
pub const fn adc1_channel(pin: u8) -> Option<u32> {
    match pin {
        36 => Some(0),
        37 => Some(1),
        38 => Some(2),
        39 => Some(3),
        32 => Some(4),
        33 => Some(5),
        34 => Some(6),
        35 => Some(7),
        _ => None,
    }
}

pub struct Esp32Gpio {
    #[cfg(target_os = "espidf")]
    outputs: u64,
    #[cfg(target_os = "espidf")]
    adc: adc_oneshot_unit_handle_t,
    #[cfg(target_os = "espidf")]
    adc_channels: u8,

    #[cfg(not(target_os = "espidf"))]
    levels: HashMap<u8, PinState>,
    #[cfg(not(target_os = "espidf"))]
    analog: HashMap<u8, u16>,
}

impl Default for Esp32Gpio {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Gpio {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            outputs: 0,
            #[cfg(target_os = "espidf")]
            adc: core::ptr::null_mut(),
            #[cfg(target_os = "espidf")]
            adc_channels: 0,

            #[cfg(not(target_os = "espidf"))]
            levels: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            analog: HashMap::new(),
        }
    }

    /// Inject a raw ADC value for the simulation backend.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_analog(&mut self, pin: u8, raw: u16) {
        self.analog.insert(pin, raw);
    }

    /// Last level written to `pin` in simulation.
    #[cfg(not(target_os = "espidf"))]
    pub fn level(&self, pin: u8) -> Option<PinState> {
        self.levels.get(&pin).copied()
    }

    #[cfg(target_os = "espidf")]
    fn ensure_adc(&mut self, channel: u32) -> Result<(), GpioError> {
        if self.adc.is_null() {
            let init_cfg = adc_oneshot_unit_init_cfg_t {
                unit_id: adc_unit_t_ADC_UNIT_1,
                ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..Default::default()
            };
            // SAFETY: the handle is owned by this adapter and only used from
            // the control-loop thread.
            let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut self.adc) };
            if ret != ESP_OK as i32 {
                return Err(GpioError::Driver(ret));
            }
        }
        let bit = 1u8 << channel;
        if self.adc_channels & bit == 0 {
            let chan_cfg = adc_oneshot_chan_cfg_t {
                atten: adc_atten_t_ADC_ATTEN_DB_12,
                bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            // SAFETY: `self.adc` was initialised above.
            let ret = unsafe { adc_oneshot_config_channel(self.adc, channel, &chan_cfg) };
            if ret != ESP_OK as i32 {
                return Err(GpioError::Driver(ret));
            }
            self.adc_channels |= bit;
        }
        Ok(())
    }
}

fn check_pin(pin: u8) -> Result<(), GpioError> {
    if pin > MAX_GPIO {
        return Err(GpioError::InvalidPin(pin));
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
impl GpioPort for Esp32Gpio {
    fn set_level(&mut self, pin: u8, level: PinState) -> Result<(), GpioError> {
        check_pin(pin)?;
        let bit = 1u64 << pin;
        if self.outputs & bit == 0 {
            // Input+output so read_digital reflects the driven level.
            // SAFETY: plain register configuration for a validated pin.
            let ret = unsafe { gpio_set_direction(pin as i32, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT) };
            if ret != ESP_OK as i32 {
                return Err(GpioError::Driver(ret));
            }
            self.outputs |= bit;
        }
        // SAFETY: pin validated and configured as output.
        let ret = unsafe { gpio_set_level(pin as i32, u32::from(level == PinState::High)) };
        if ret != ESP_OK as i32 {
            return Err(GpioError::Driver(ret));
        }
        Ok(())
    }

    fn read_analog(&mut self, pin: u8) -> Result<u16, GpioError> {
        let channel = adc1_channel(pin).ok_or(GpioError::InvalidPin(pin))?;
        self.ensure_adc(channel)?;
        let mut raw: i32 = 0;
        // SAFETY: unit and channel configured by ensure_adc().
        let ret = unsafe { adc_oneshot_read(self.adc, channel, &mut raw) };
        if ret != ESP_OK as i32 {
            return Err(GpioError::Driver(ret));
        }
        Ok(raw.max(0) as u16)
    }

    fn read_digital(&mut self, pin: u8) -> Result<PinState, GpioError> {
        check_pin(pin)?;
        // SAFETY: read-only register access for a validated pin.
        let level = unsafe { gpio_get_level(pin as i32) };
        Ok(if level != 0 { PinState::High } else { PinState::Low })
    }
}

#[cfg(not(target_os = "espidf"))]
impl GpioPort for Esp32Gpio {
    fn set_level(&mut self, pin: u8, level: PinState) -> Result<(), GpioError> {
        check_pin(pin)?;
        self.levels.insert(pin, level);
        Ok(())
    }

    fn read_analog(&mut self, pin: u8) -> Result<u16, GpioError> {
        adc1_channel(pin).ok_or(GpioError::InvalidPin(pin))?;
        Ok(self.analog.get(&pin).copied().unwrap_or(0))
    }

    fn read_digital(&mut self, pin: u8) -> Result<PinState, GpioError> {
        check_pin(pin)?;
        Ok(self.levels.get(&pin).copied().unwrap_or(PinState::Low))
    }
}
