//! Daily time-window trigger with a minimum day interval and rain check.
//!
//! While Idle the order of checks is: interval since the last watering,
//! then rain, then the start minute.  While Watering only rain and the stop
//! minute matter; the interval gate never holds a running cycle open.

use super::{Decision, NextEvent, Phase, PollInput, StopReason, TriggerPolicy};
use crate::app::ports::LocalTime;
use crate::config::{SystemConfig, TimeOfDay};

const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone)]
pub struct ScheduledPolicy {
    start: TimeOfDay,
    stop: TimeOfDay,
    interval_days: u32,
    rain_cancel_percent: u8,
    poll_ms: u64,
    /// Unix seconds of the last start, 0 if never.
    last_watering: u64,
    last_rain: Option<u8>,
    last_time: Option<LocalTime>,
}

impl ScheduledPolicy {
    pub fn new(start: TimeOfDay, stop: TimeOfDay, interval_days: u32, rain_cancel_percent: u8, poll_ms: u64) -> Self {
        Self {
            start,
            stop,
            interval_days,
            rain_cancel_percent,
            poll_ms,
            last_watering: 0,
            last_rain: None,
            last_time: None,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            config.start_time,
            config.stop_time,
            config.interval_days,
            config.rain_cancel_percent,
            config.scheduled_poll_ms,
        )
    }

    pub fn last_watering(&self) -> u64 {
        self.last_watering
    }

    pub fn last_rain(&self) -> Option<u8> {
        self.last_rain
    }

    /// Whole days elapsed since the last start.
    pub fn days_since_last(&self, now: &LocalTime) -> u64 {
        now.unix.saturating_sub(self.last_watering) / SECS_PER_DAY
    }

    /// Earliest unix time at which the interval gate opens.
    pub fn next_watering_date(&self) -> u64 {
        self.last_watering
            .saturating_add(u64::from(self.interval_days) * SECS_PER_DAY)
    }

    fn is_at(now: &LocalTime, t: TimeOfDay) -> bool {
        now.hour == t.hour && now.minute == t.minute
    }

    fn raining(&self, rain: Option<u8>) -> Option<u8> {
        rain.filter(|&level| level >= self.rain_cancel_percent)
    }

    /// First occurrence of `t` at or after `from`, in `now`'s local frame.
    fn next_occurrence(now: &LocalTime, from: u64, t: TimeOfDay) -> u64 {
        let today = now.midnight();
        let day = today + from.saturating_sub(today) / SECS_PER_DAY * SECS_PER_DAY;
        let candidate = day + u64::from(t.seconds());
        if candidate < from {
            candidate + SECS_PER_DAY
        } else {
            candidate
        }
    }
}

impl TriggerPolicy for ScheduledPolicy {
    fn poll_interval_ms(&self) -> u64 {
        self.poll_ms
    }

    /// Scheduled cycles never write relay state to flash.
    fn persist_actions(&self) -> bool {
        false
    }

    fn evaluate(&mut self, phase: Phase, input: &PollInput) -> Decision {
        let Some(now) = input.wall else {
            return Decision::Hold;
        };
        self.last_time = Some(now);
        self.last_rain = input.rain;

        match phase {
            Phase::Idle => {
                if self.days_since_last(&now) < u64::from(self.interval_days) {
                    return Decision::Hold;
                }
                if let Some(level) = self.raining(input.rain) {
                    return Decision::RainCancel { level };
                }
                if Self::is_at(&now, self.start) {
                    Decision::Start
                } else {
                    Decision::Hold
                }
            }
            Phase::Watering => {
                if let Some(level) = self.raining(input.rain) {
                    return Decision::RainCancel { level };
                }
                if Self::is_at(&now, self.stop) {
                    Decision::Stop(StopReason::WindowClosed)
                } else {
                    Decision::Hold
                }
            }
        }
    }

    fn on_start(&mut self, input: &PollInput) -> Option<u64> {
        let now = input.wall?;
        self.last_watering = now.unix;
        Some(now.unix)
    }

    fn restore(&mut self, last_watering: u64) {
        self.last_watering = last_watering;
    }

    fn next_event(&self, phase: Phase, _next_poll_ms: u64) -> Option<NextEvent> {
        let now = self.last_time?;
        Some(match phase {
            Phase::Watering => NextEvent::StopAt {
                unix: Self::next_occurrence(&now, now.unix, self.stop),
            },
            Phase::Idle => {
                let from = self.next_watering_date().max(now.unix);
                NextEvent::StartAt {
                    unix: Self::next_occurrence(&now, from, self.start),
                }
            }
        })
    }
}
