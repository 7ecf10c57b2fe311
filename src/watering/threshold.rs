//! Soil-moisture hysteresis trigger.

use super::{Decision, NextEvent, Phase, PollInput, StopReason, TriggerPolicy};
use crate::config::SystemConfig;

/// Start below `min_percent`, stop above `max_percent`.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    min_percent: u8,
    max_percent: u8,
    poll_ms: u64,
    last_soil: Option<u8>,
}

impl ThresholdPolicy {
    pub fn new(min_percent: u8, max_percent: u8, poll_ms: u64) -> Self {
        Self {
            min_percent,
            max_percent,
            poll_ms,
            last_soil: None,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(config.soil_min_percent, config.soil_max_percent, config.threshold_poll_ms)
    }

    /// Most recent soil reading seen by [`evaluate`](TriggerPolicy::evaluate).
    pub fn last_soil(&self) -> Option<u8> {
        self.last_soil
    }
}

impl TriggerPolicy for ThresholdPolicy {
    fn poll_interval_ms(&self) -> u64 {
        self.poll_ms
    }

    fn persist_actions(&self) -> bool {
        true
    }

    fn evaluate(&mut self, phase: Phase, input: &PollInput) -> Decision {
        let Some(soil) = input.soil else {
            return Decision::Hold;
        };
        self.last_soil = Some(soil);

        if soil > self.max_percent {
            Decision::Stop(StopReason::MoistureReached)
        } else if soil < self.min_percent && phase == Phase::Idle {
            Decision::Start
        } else {
            Decision::Hold
        }
    }

    fn next_event(&self, _phase: Phase, next_poll_ms: u64) -> Option<NextEvent> {
        Some(NextEvent::PollAt { ms: next_poll_ms })
    }
}
