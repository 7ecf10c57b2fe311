//! Delayed relay-action scheduler.
//!
//! Producers (the watering automation, web/WebSocket commands) enqueue
//! relay state changes with a delay.  The control loop calls
//! [`ActionScheduler::tick`] every iteration; each call inspects only the
//! queue head and executes it once due.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Action producers                        │
//! │                                                              │
//! │  ┌────────────────┐   ┌────────────────┐   ┌──────────────┐  │
//! │  │ Watering       │   │ Web / WS       │   │ Boot button  │  │
//! │  │ automation     │   │ handlers       │   │              │  │
//! │  └───────┬────────┘   └───────┬────────┘   └──────┬───────┘  │
//! │          │  enqueue() resolves the channel now    │          │
//! │          ▼                    ▼                   ▼          │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │        FIFO  [head] ── a1 ── a2 ── a3 ── ...           │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          │ tick(now): head only, ≤1 per call │
//! │                          ▼                                   │
//! │        GpioPort::set_level  +  RelayRegistry::set_status     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Head-only processing
//!
//! The queue is strictly FIFO.  A head whose due time is still in the
//! future blocks every entry behind it, even entries that are already due.
//! At most one action runs per tick, so a burst of enqueues drains at one
//! action per control-loop iteration.  Do not turn this into a priority
//! queue: callers rely on same-channel actions never being reordered.

use std::sync::{Arc, Mutex};

use heapless::Deque;
use log::{error, info, warn};

use crate::app::ports::{ClockPort, FilesystemPort, GpioPort};
use crate::relay::{ChannelInfo, RelayRegistry};
use crate::sync::{LockPolicy, acquire};

// ═══════════════════════════════════════════════════════════════
//  Action types
// ═══════════════════════════════════════════════════════════════

/// Maximum number of pending actions (stack-allocated).
pub const QUEUE_CAPACITY: usize = 16;

/// A scheduled relay state change.  Immutable once queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAction {
    /// Channel attributes captured at enqueue time.
    pub channel: ChannelInfo,
    pub desired_state: bool,
    pub enqueued_at: u64,
    /// Earliest execution time; never before `enqueued_at`.
    pub due_at: u64,
    /// Write the new state into the relay table after switching.
    pub persist: bool,
}

/// What [`ActionScheduler::tick`] did with the head action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedAction {
    pub action: RelayAction,
    /// Pin level was written successfully.
    pub switched: bool,
    /// Relay table was updated.
    pub persisted: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

pub struct ActionScheduler<F, C> {
    registry: Arc<RelayRegistry<F>>,
    clock: C,
    queue: Mutex<Deque<RelayAction, QUEUE_CAPACITY>>,
    policy: LockPolicy,
}

impl<F: FilesystemPort, C: ClockPort> ActionScheduler<F, C> {
    pub fn new(registry: Arc<RelayRegistry<F>>, clock: C, policy: LockPolicy) -> Self {
        Self {
            registry,
            clock,
            queue: Mutex::new(Deque::new()),
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<RelayRegistry<F>> {
        &self.registry
    }

    /// Queue a state change for `channel` after `delay_ms`.
    ///
    /// Returns `false` if the channel is unknown, the queue is full, or the
    /// queue lock could not be taken.
    pub fn enqueue(&self, channel: u8, desired_state: bool, delay_ms: u64, persist: bool) -> bool {
        self.enqueue_at(self.clock.now_ms(), channel, desired_state, delay_ms, persist)
    }

    /// [`enqueue`](Self::enqueue) with an explicit enqueue timestamp.
    pub fn enqueue_at(&self, now_ms: u64, channel: u8, desired_state: bool, delay_ms: u64, persist: bool) -> bool {
        let info = self.registry.resolve(channel);
        if !info.is_resolved() {
            warn!("ActionScheduler: channel {} not found, action dropped", channel);
            return false;
        }

        let action = RelayAction {
            channel: info,
            desired_state,
            enqueued_at: now_ms,
            due_at: now_ms.saturating_add(delay_ms),
            persist,
        };

        let Some(mut queue) = acquire(&self.queue, self.policy, "ActionScheduler") else {
            error!("ActionScheduler: queue busy, action for channel {} dropped", channel);
            return false;
        };
        match queue.push_back(action) {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "ActionScheduler: queue full ({} pending), action for channel {} dropped",
                    QUEUE_CAPACITY, channel
                );
                false
            }
        }
    }

    /// Run the head action if it is due.  Call once per control loop tick.
    pub fn tick(&self, now_ms: u64, gpio: &mut dyn GpioPort) -> Option<ExecutedAction> {
        let action = {
            let mut queue = acquire(&self.queue, self.policy, "ActionScheduler")?;
            if queue.front().is_none_or(|head| now_ms < head.due_at) {
                return None;
            }
            queue.pop_front()?
        };
        // Queue lock is released before any I/O.
        Some(self.execute(action, gpio))
    }

    /// Number of queued actions (0 if the lock is contended).
    pub fn pending(&self) -> usize {
        acquire(&self.queue, self.policy, "ActionScheduler").map_or(0, |q| q.len())
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Due time of the head action, if any.
    pub fn next_due(&self) -> Option<u64> {
        acquire(&self.queue, self.policy, "ActionScheduler").and_then(|q| q.front().map(|a| a.due_at))
    }

    fn execute(&self, action: RelayAction, gpio: &mut dyn GpioPort) -> ExecutedAction {
        let ch = &action.channel;
        let state = action.desired_state;
        let Some(pin) = ch.pin else {
            warn!("ActionScheduler: channel {} has no pin, action discarded", ch.id);
            return ExecutedAction {
                action,
                switched: false,
                persisted: false,
            };
        };

        let switched = match gpio.set_level(pin, self.registry.apply_polarity(state)) {
            Ok(()) => true,
            Err(e) => {
                error!("ActionScheduler: pin {} write failed: {}", pin, e);
                false
            }
        };

        let persisted = action.persist
            && match self.registry.set_status(ch.id, state) {
                Ok(true) => true,
                Ok(false) => {
                    warn!("ActionScheduler: channel {} vanished before persist", ch.id);
                    false
                }
                Err(e) => {
                    log::log!(e.severity().level(), "ActionScheduler: persist failed: {}", e);
                    false
                }
            };

        info!(
            "ActionScheduler: '{}' (id={}, pin={}) -> {} [{}]",
            ch.label,
            ch.id,
            pin,
            if state { "ON" } else { "OFF" },
            if persisted { "saved" } else { "not saved" }
        );

        ExecutedAction {
            action,
            switched,
            persisted,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
