//! Fuzz target: `ActionScheduler` queue
//!
//! Interprets the input as a sequence of enqueue / tick operations and
//! checks the queue contract:
//! - Never more than `QUEUE_CAPACITY` pending actions
//! - At most one action executed per tick, never before its due time
//! - Actions execute in enqueue order
//!
//! cargo fuzz run fuzz_action_queue

#![no_main]

use std::collections::VecDeque;
use std::sync::Arc;

use embedded_hal::digital::PinState;
use libfuzzer_sys::fuzz_target;
use microbox::adapters::fs::MemFs;
use microbox::app::ports::{ClockPort, GpioError, GpioPort};
use microbox::config::SystemConfig;
use microbox::relay::RelayRegistry;
use microbox::scheduler::{ActionScheduler, QUEUE_CAPACITY};
use microbox::store::{ConfigStore, StoreDefaults};
use microbox::sync::LockPolicy;

struct ZeroClock;

impl ClockPort for ZeroClock {
    fn now_ms(&self) -> u64 {
        0
    }
}

struct NullGpio;

impl GpioPort for NullGpio {
    fn set_level(&mut self, _pin: u8, _level: PinState) -> Result<(), GpioError> {
        Ok(())
    }

    fn read_analog(&mut self, _pin: u8) -> Result<u16, GpioError> {
        Ok(0)
    }

    fn read_digital(&mut self, _pin: u8) -> Result<PinState, GpioError> {
        Ok(PinState::Low)
    }
}

fuzz_target!(|data: &[u8]| {
    let config = SystemConfig::default();
    let store = Arc::new(ConfigStore::new(
        MemFs::new(),
        StoreDefaults::from_config(&config),
        LockPolicy::FailFast,
    ));
    let registry = Arc::new(RelayRegistry::new(store, config.polarity));
    if registry.initialize_defaults(&config.relays).is_err() {
        return;
    }
    let sched = ActionScheduler::new(registry, ZeroClock, LockPolicy::FailFast);

    let mut model: VecDeque<(u64, u8, bool)> = VecDeque::new();
    let mut now = 0u64;
    let mut gpio = NullGpio;

    for chunk in data.chunks(3) {
        let [op, a, b] = match chunk {
            [op, a, b] => [*op, *a, *b],
            _ => return,
        };
        if op & 1 == 0 {
            let channel = a % 3;
            let state = b & 1 == 1;
            let delay = u64::from(b) * 10;
            let accepted = sched.enqueue_at(now, channel, state, delay, op & 2 == 2);
            let expected = channel < 2 && model.len() < QUEUE_CAPACITY;
            assert_eq!(accepted, expected);
            if accepted {
                model.push_back((now + delay, channel, state));
            }
        } else {
            now += u64::from(a) * 10;
            let done = sched.tick(now, &mut gpio);
            match model.front().copied() {
                Some((due, channel, state)) if due <= now => {
                    let done = done.expect("due head must run");
                    assert_eq!((done.action.channel.id, done.action.desired_state), (channel, state));
                    model.pop_front();
                }
                _ => assert!(done.is_none()),
            }
        }
        assert_eq!(sched.pending(), model.len());
    }
});
