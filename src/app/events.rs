//! Outbound application events.
//!
//! The watering automation and [`AppService`](super::service::AppService)
//! emit these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters decide what to do with them: log to serial, push to a
//! dashboard bridge, etc.

use crate::watering::StopReason;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Automatic watering started (emitted once per dedup window).
    WateringStarted,

    /// Automatic watering completed (emitted once per dedup window).
    WateringCompleted(StopReason),

    /// Scheduled watering suppressed by rain (emitted once per dedup window).
    RainCancelled { level: u8 },

    /// AUTO_WATERING changed since the previous poll.
    AutomationToggled { enabled: bool },

    /// The service finished boot: relays restored, automation loaded.
    Started { channels: usize, in_progress: bool },
}
