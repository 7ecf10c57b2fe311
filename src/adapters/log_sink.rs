//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART in production).  A dashboard bridge would implement the
//! same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::watering::StopReason;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::WateringStarted => {
                info!("WATER | automatic watering started");
            }
            AppEvent::WateringCompleted(reason) => {
                let why = match reason {
                    StopReason::MoistureReached => "soil moisture reached",
                    StopReason::WindowClosed => "window closed",
                    StopReason::Rain => "rain",
                };
                info!("WATER | automatic watering completed ({})", why);
            }
            AppEvent::RainCancelled { level } => {
                info!("WATER | automatic watering cancelled due to rain ({}%)", level);
            }
            AppEvent::AutomationToggled { enabled } => {
                info!("WATER | auto watering {}", if *enabled { "enabled" } else { "disabled" });
            }
            AppEvent::Started {
                channels,
                in_progress,
            } => {
                info!("START | relays={} watering={}", channels, in_progress);
            }
        }
    }
}
