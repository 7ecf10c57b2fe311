//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                   |
//! |------------|--------------------|-------------------------------|
//! | `fs`       | FilesystemPort     | SPIFFS via VFS / in-memory    |
//! | `gpio`     | GpioPort           | ESP32 GPIO, ADC1 oneshot      |
//! | `hardware` | SensorPort         | soil + rain analog inputs     |
//! |            | GpioPort           | (delegates to `gpio`)         |
//! | `log_sink` | EventSink          | Serial log output             |
//! | `time`     | ClockPort          | ESP32 system timer            |
//! |            | WallClockPort      | SNTP / RTC localtime          |

pub mod fs;
pub mod gpio;
pub mod hardware;
pub mod log_sink;
pub mod time;
