//! ESP32 time adapter.
//!
//! Provides monotonic and wall-clock time for the MicroBox controller.
//!
//! - **`target_os = "espidf"`**: monotonic time from `esp_timer_get_time()`;
//!   local time from `gettimeofday` + `localtime_r` (set by SNTP or the RTC
//!   module).
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `SystemTime` (UTC) for host-side simulation.

use crate::app::ports::{ClockPort, LocalTime, WallClockPort};

/// Reject obviously unsynced time (before 2020-01-01).
const EPOCH_2020: u64 = 1_577_836_800;

/// Time adapter for the ESP32 platform.
#[derive(Clone)]
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Local wall-clock time.  `None` if the clock has not been synced.
    #[cfg(target_os = "espidf")]
    pub fn now_local(&self) -> Option<LocalTime> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        if (tv.tv_sec as u64) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        if !(0..24).contains(&tm.tm_hour) || !(0..60).contains(&tm.tm_min) {
            return None;
        }
        Some(LocalTime {
            unix: tv.tv_sec as u64,
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
        })
    }

    /// Local wall-clock time.  Host simulation reports UTC.
    #[cfg(not(target_os = "espidf"))]
    pub fn now_local(&self) -> Option<LocalTime> {
        let unix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();
        (unix >= EPOCH_2020).then(|| LocalTime::from_unix(unix))
    }
}

impl ClockPort for Esp32TimeAdapter {
    fn now_ms(&self) -> u64 {
        self.uptime_ms()
    }
}

impl WallClockPort for Esp32TimeAdapter {
    fn local_time(&self) -> Option<LocalTime> {
        self.now_local()
    }
}
