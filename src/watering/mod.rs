//! Watering automation state machine.
//!
//! Two phases, `Idle` and `Watering`.  Every poll interval the automation
//! re-reads AUTO_WATERING from the state section, asks its
//! [`TriggerPolicy`] for a [`Decision`], and on a phase change enqueues one
//! relay action per managed channel through the [`ActionScheduler`].
//!
//! ```text
//!            Start (enabled ∧ trigger ∧ Idle)
//!   ┌──────┐ ─────────────────────────────────▶ ┌──────────┐
//!   │ Idle │                                    │ Watering │
//!   └──────┘ ◀───────────────────────────────── └──────────┘
//!            Stop (threshold / window / rain)
//! ```
//!
//! Status lines are deduplicated with `started_logged`, `completed_logged`
//! and `rain_cancel_logged`; all three reset on a fixed interval that is
//! independent of transitions.

mod scheduled;
mod threshold;

pub use scheduled::ScheduledPolicy;
pub use threshold::ThresholdPolicy;

use std::sync::Arc;

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{
    ClockPort, EventSink, FilesystemPort, LocalTime, SensorPort, WallClockPort,
};
use crate::config::{AutomationVariant, SystemConfig};
use crate::scheduler::ActionScheduler;
use crate::store::{ConfigStore, KEY_AUTO_WATERING, Section};

// ───────────────────────────────────────────────────────────────
// Types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Watering,
}

/// Why watering ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Soil moisture rose above the upper threshold.
    MoistureReached,
    /// The scheduled stop time arrived.
    WindowClosed,
    /// Rain level crossed the cancel threshold.
    Rain,
}

/// A policy's verdict for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Start,
    Stop(StopReason),
    /// Rain detected; stops watering if active and suppresses a start.
    RainCancel { level: u8 },
    Hold,
}

/// Readings gathered once per poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInput {
    pub now_ms: u64,
    pub soil: Option<u8>,
    pub rain: Option<u8>,
    pub wall: Option<LocalTime>,
}

/// Upcoming automation event reported by [`WateringAutomation::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextEvent {
    /// Next threshold evaluation, monotonic milliseconds.
    PollAt { ms: u64 },
    /// Next scheduled start, unix seconds.
    StartAt { unix: u64 },
    /// Scheduled stop of the current watering, unix seconds.
    StopAt { unix: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomationStatus {
    pub enabled: bool,
    pub in_progress: bool,
    pub next_event_time: Option<NextEvent>,
}

/// Variant-specific trigger logic.  Policies hold only their own trigger
/// memory; flag reads, logging and relay actions stay in the automation.
pub trait TriggerPolicy {
    fn poll_interval_ms(&self) -> u64;

    /// Whether the relay actions this policy produces are persisted.
    fn persist_actions(&self) -> bool;

    fn evaluate(&mut self, phase: Phase, input: &PollInput) -> Decision;

    /// Called on Idle → Watering.  A returned timestamp is stored as
    /// LAST_WATERING.
    fn on_start(&mut self, _input: &PollInput) -> Option<u64> {
        None
    }

    /// Seed trigger memory with the persisted LAST_WATERING at boot.
    fn restore(&mut self, _last_watering: u64) {}

    fn next_event(&self, phase: Phase, next_poll_ms: u64) -> Option<NextEvent>;
}

/// Runtime-selected policy.
#[derive(Debug, Clone)]
pub enum Policy {
    Threshold(ThresholdPolicy),
    Scheduled(ScheduledPolicy),
}

impl Policy {
    pub fn from_config(config: &SystemConfig) -> Self {
        match config.variant {
            AutomationVariant::Threshold => Self::Threshold(ThresholdPolicy::from_config(config)),
            AutomationVariant::Scheduled => Self::Scheduled(ScheduledPolicy::from_config(config)),
        }
    }
}

impl TriggerPolicy for Policy {
    fn poll_interval_ms(&self) -> u64 {
        match self {
            Self::Threshold(p) => p.poll_interval_ms(),
            Self::Scheduled(p) => p.poll_interval_ms(),
        }
    }

    fn persist_actions(&self) -> bool {
        match self {
            Self::Threshold(p) => p.persist_actions(),
            Self::Scheduled(p) => p.persist_actions(),
        }
    }

    fn evaluate(&mut self, phase: Phase, input: &PollInput) -> Decision {
        match self {
            Self::Threshold(p) => p.evaluate(phase, input),
            Self::Scheduled(p) => p.evaluate(phase, input),
        }
    }

    fn on_start(&mut self, input: &PollInput) -> Option<u64> {
        match self {
            Self::Threshold(p) => p.on_start(input),
            Self::Scheduled(p) => p.on_start(input),
        }
    }

    fn restore(&mut self, last_watering: u64) {
        match self {
            Self::Threshold(p) => p.restore(last_watering),
            Self::Scheduled(p) => p.restore(last_watering),
        }
    }

    fn next_event(&self, phase: Phase, next_poll_ms: u64) -> Option<NextEvent> {
        match self {
            Self::Threshold(p) => p.next_event(phase, next_poll_ms),
            Self::Scheduled(p) => p.next_event(phase, next_poll_ms),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// WateringAutomation
// ───────────────────────────────────────────────────────────────

pub struct WateringAutomation<F, C, P> {
    store: Arc<ConfigStore<F>>,
    scheduler: Arc<ActionScheduler<F, C>>,
    policy: P,
    /// Channel ids switched together on every transition.
    channels: Vec<u8>,
    action_delay_ms: u64,
    dedup_reset_ms: u64,

    phase: Phase,
    enabled: bool,
    started_logged: bool,
    completed_logged: bool,
    rain_cancel_logged: bool,
    last_poll_ms: Option<u64>,
    last_dedup_reset_ms: u64,
}

impl<F: FilesystemPort, C: ClockPort, P: TriggerPolicy> WateringAutomation<F, C, P> {
    pub fn new(
        store: Arc<ConfigStore<F>>,
        scheduler: Arc<ActionScheduler<F, C>>,
        policy: P,
        channels: Vec<u8>,
        config: &SystemConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            policy,
            channels,
            action_delay_ms: config.action_delay_ms,
            dedup_reset_ms: config.dedup_reset_ms,
            phase: Phase::Idle,
            enabled: false,
            started_logged: false,
            completed_logged: false,
            rain_cancel_logged: false,
            last_poll_ms: None,
            last_dedup_reset_ms: 0,
        }
    }

    /// Load the enabled flag and trigger memory; derive the starting phase
    /// from the persisted relay states.
    pub fn begin(&mut self) {
        self.enabled = self.read_enabled();
        self.reload_last_watering();

        let registry = self.scheduler.registry();
        let any_on = self.channels.iter().any(|&id| registry.resolve(id).state);
        self.phase = if any_on { Phase::Watering } else { Phase::Idle };
        info!(
            "Watering: auto={} phase={:?} channels={:?}",
            if self.enabled { "enabled" } else { "disabled" },
            self.phase,
            self.channels
        );
    }

    /// Evaluate once if the poll interval has elapsed.  Returns the
    /// decision taken, or `None` when not due or disabled.
    pub fn poll(
        &mut self,
        now_ms: u64,
        sensors: &mut dyn SensorPort,
        wall: &dyn WallClockPort,
        sink: &mut dyn EventSink,
    ) -> Option<Decision> {
        if now_ms.saturating_sub(self.last_dedup_reset_ms) >= self.dedup_reset_ms {
            self.last_dedup_reset_ms = now_ms;
            self.reset_flags();
        }

        if let Some(last) = self.last_poll_ms {
            if now_ms.saturating_sub(last) < self.policy.poll_interval_ms() {
                return None;
            }
        }
        self.last_poll_ms = Some(now_ms);

        let enabled = self.read_enabled();
        if enabled != self.enabled {
            self.enabled = enabled;
            sink.emit(&AppEvent::AutomationToggled { enabled });
        }
        if !enabled {
            return None;
        }

        let input = PollInput {
            now_ms,
            soil: sensors.soil_moisture_percent(),
            rain: sensors.rain_level_percent(),
            wall: wall.local_time(),
        };
        let decision = self.policy.evaluate(self.phase, &input);
        debug!("Watering: {:?} in {:?} ({:?})", decision, self.phase, input);

        match decision {
            Decision::Start if self.phase == Phase::Idle => self.start(&input, sink),
            Decision::Stop(reason) if self.phase == Phase::Watering => self.stop(now_ms, reason, sink),
            Decision::RainCancel { level } => {
                if !self.rain_cancel_logged {
                    self.rain_cancel_logged = true;
                    sink.emit(&AppEvent::RainCancelled { level });
                }
                if self.phase == Phase::Watering {
                    self.stop(now_ms, StopReason::Rain, sink);
                }
            }
            Decision::Start | Decision::Stop(_) | Decision::Hold => {}
        }
        Some(decision)
    }

    /// Re-seed trigger memory from the stored LAST_WATERING.  Call after
    /// anything rewrites the state section behind the automation's back.
    pub fn reload_last_watering(&mut self) {
        match self.store.last_watering() {
            Ok(last) => self.policy.restore(last),
            Err(e) => warn!("Watering: LAST_WATERING unavailable: {}", e),
        }
    }

    pub fn status(&self) -> AutomationStatus {
        let next_poll = self
            .last_poll_ms
            .map_or(0, |t| t.saturating_add(self.policy.poll_interval_ms()));
        AutomationStatus {
            enabled: self.enabled,
            in_progress: self.phase == Phase::Watering,
            next_event_time: self.policy.next_event(self.phase, next_poll),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    // ── Transitions ───────────────────────────────────────────

    fn start(&mut self, input: &PollInput, sink: &mut dyn EventSink) {
        self.phase = Phase::Watering;
        if let Some(ts) = self.policy.on_start(input) {
            if let Err(e) = self.store.set_last_watering(ts) {
                warn!("Watering: failed to store LAST_WATERING: {}", e);
            }
        }
        self.switch_all(input.now_ms, true);

        if !self.started_logged {
            self.started_logged = true;
            self.completed_logged = false;
            sink.emit(&AppEvent::WateringStarted);
        }
    }

    fn stop(&mut self, now_ms: u64, reason: StopReason, sink: &mut dyn EventSink) {
        self.phase = Phase::Idle;
        self.switch_all(now_ms, false);

        if !self.completed_logged {
            self.completed_logged = true;
            self.started_logged = false;
            sink.emit(&AppEvent::WateringCompleted(reason));
        }
    }

    /// Queue `on` for every channel, due `action_delay_ms` after the poll
    /// time.
    fn switch_all(&self, now_ms: u64, on: bool) {
        let persist = self.policy.persist_actions();
        let failed = self
            .channels
            .iter()
            .filter(|&&id| {
                !self
                    .scheduler
                    .enqueue_at(now_ms, id, on, self.action_delay_ms, persist)
            })
            .count();
        if failed > 0 {
            warn!(
                "Watering: {} of {} relay actions not queued",
                failed,
                self.channels.len()
            );
        }
    }

    fn reset_flags(&mut self) {
        self.started_logged = false;
        self.completed_logged = false;
        self.rain_cancel_logged = false;
    }

    fn read_enabled(&self) -> bool {
        match self.store.read_flag(Section::State, KEY_AUTO_WATERING) {
            Ok(v) => v,
            Err(e) => {
                warn!("Watering: AUTO_WATERING unreadable ({}), treating as disabled", e);
                false
            }
        }
    }
}
