//! WateringAutomation end to end: store flags, policy decisions, queued
//! relay actions and deduplicated status events.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use microbox::adapters::fs::MemFs;
use microbox::app::events::AppEvent;
use microbox::config::{AutomationVariant, SystemConfig};
use microbox::relay::RelayRegistry;
use microbox::scheduler::ActionScheduler;
use microbox::store::{ConfigStore, KEY_AUTO_WATERING, Section};
use microbox::watering::{Decision, NextEvent, Phase, Policy, StopReason, WateringAutomation};

use super::mock_hw::{
    MockBoard, MockClock, MockWallClock, RecordingSink, flaky_store, memory_store,
};

// 2025-01-10 00:00:00 UTC
const DAY0: u64 = 1_736_467_200;
const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

struct Rig {
    store: Arc<ConfigStore<MemFs>>,
    sched: Arc<ActionScheduler<MemFs, MockClock>>,
    auto: WateringAutomation<MemFs, MockClock, Policy>,
    board: MockBoard,
    sink: RecordingSink,
}

fn rig(config: &SystemConfig, enabled: bool) -> Rig {
    let store = memory_store(config);
    store.bootstrap().unwrap();
    store.set_value(Section::State, KEY_AUTO_WATERING, enabled).unwrap();

    let registry = Arc::new(RelayRegistry::new(Arc::clone(&store), config.polarity));
    let sched = Arc::new(ActionScheduler::new(registry, MockClock::new(), config.lock_policy));
    let channels = config.relays.iter().map(|r| r.id).collect();
    let mut auto = WateringAutomation::new(
        Arc::clone(&store),
        Arc::clone(&sched),
        Policy::from_config(config),
        channels,
        config,
    );
    auto.begin();

    Rig {
        store,
        sched,
        auto,
        board: MockBoard::new(),
        sink: RecordingSink::new(),
    }
}

fn scheduled_config() -> SystemConfig {
    SystemConfig {
        variant: AutomationVariant::Scheduled,
        ..SystemConfig::default()
    }
}

impl Rig {
    fn poll(&mut self, now_ms: u64, wall: &MockWallClock) -> Option<Decision> {
        self.auto.poll(now_ms, &mut self.board, wall, &mut self.sink)
    }

    /// Drain every queued action that is due at `now_ms`.
    fn drain(&mut self, now_ms: u64) -> Vec<(u8, bool, bool)> {
        let mut out = Vec::new();
        while let Some(done) = self.sched.tick(now_ms, &mut self.board) {
            out.push((done.action.channel.id, done.action.desired_state, done.persisted));
        }
        out
    }
}

// ═══════════════════════════════════════════════════════════════
//  Threshold variant
// ═══════════════════════════════════════════════════════════════

#[test]
fn dry_soil_starts_watering_on_all_channels() {
    let config = SystemConfig::default();
    let mut r = rig(&config, true);
    let wall = MockWallClock::unsynced();
    r.board.soil = Some(10);

    assert_eq!(r.poll(0, &wall), Some(Decision::Start));
    assert_eq!(r.auto.phase(), Phase::Watering);
    assert_eq!(r.sink.count(&AppEvent::WateringStarted), 1);
    assert_eq!(r.sched.pending(), 2);

    assert!(r.drain(999).is_empty());
    assert_eq!(r.drain(1000), vec![(0, true, true), (1, true, true)]);
    assert!(r.sched.registry().resolve(1).state);
}

#[test]
fn wet_soil_stops_watering() {
    let config = SystemConfig::default();
    let mut r = rig(&config, true);
    let wall = MockWallClock::unsynced();

    r.board.soil = Some(10);
    r.poll(0, &wall);
    r.drain(1000);

    r.board.soil = Some(40);
    assert_eq!(r.poll(5000, &wall), Some(Decision::Hold));
    r.board.soil = Some(75);
    assert_eq!(r.poll(10_000, &wall), Some(Decision::Stop(StopReason::MoistureReached)));
    assert_eq!(r.auto.phase(), Phase::Idle);
    assert_eq!(
        r.sink.count(&AppEvent::WateringCompleted(StopReason::MoistureReached)),
        1
    );
    assert_eq!(r.drain(11_000), vec![(0, false, true), (1, false, true)]);
}

#[test]
fn polls_are_gated_by_interval() {
    let config = SystemConfig::default();
    let mut r = rig(&config, true);
    let wall = MockWallClock::unsynced();
    r.board.soil = Some(30);

    assert!(r.poll(0, &wall).is_some());
    assert!(r.poll(4999, &wall).is_none());
    assert!(r.poll(5000, &wall).is_some());
    assert_eq!(
        r.auto.status().next_event_time,
        Some(NextEvent::PollAt { ms: 10_000 })
    );
}

#[test]
fn disabled_automation_never_evaluates() {
    let config = SystemConfig::default();
    let mut r = rig(&config, false);
    let wall = MockWallClock::unsynced();
    r.board.soil = Some(0);

    for t in [0, 5000, 10_000] {
        assert_eq!(r.poll(t, &wall), None);
    }
    assert_eq!(r.auto.phase(), Phase::Idle);
    assert!(r.sched.is_idle());
    assert!(r.sink.events.is_empty());
}

#[test]
fn enabling_at_runtime_is_picked_up() {
    let config = SystemConfig::default();
    let mut r = rig(&config, false);
    let wall = MockWallClock::unsynced();
    r.board.soil = Some(5);

    assert_eq!(r.poll(0, &wall), None);
    r.store.set_value(Section::State, KEY_AUTO_WATERING, true).unwrap();
    assert_eq!(r.poll(5000, &wall), Some(Decision::Start));
    assert_eq!(r.sink.events[0], AppEvent::AutomationToggled { enabled: true });
}

#[test]
fn repeated_start_decisions_enqueue_once() {
    let config = SystemConfig::default();
    let mut r = rig(&config, true);
    let wall = MockWallClock::unsynced();
    r.board.soil = Some(15);

    r.poll(0, &wall);
    r.drain(1000);
    // Still dry, already watering: hold, nothing new queued.
    assert_eq!(r.poll(5000, &wall), Some(Decision::Hold));
    assert!(r.sched.is_idle());
}

#[test]
fn boot_phase_follows_persisted_relays() {
    let config = SystemConfig::default();
    let store = memory_store(&config);
    store.bootstrap().unwrap();
    let registry = Arc::new(RelayRegistry::new(Arc::clone(&store), config.polarity));
    assert_eq!(registry.set_status(1, true), Ok(true));

    let sched = Arc::new(ActionScheduler::new(registry, MockClock::new(), config.lock_policy));
    let mut auto = WateringAutomation::new(store, sched, Policy::from_config(&config), vec![0, 1], &config);
    auto.begin();
    assert_eq!(auto.phase(), Phase::Watering);
    assert!(auto.status().in_progress);
}

// ═══════════════════════════════════════════════════════════════
//  Scheduled variant
// ═══════════════════════════════════════════════════════════════

#[test]
fn scheduled_window_runs_start_to_stop() {
    let config = scheduled_config();
    let mut r = rig(&config, true);
    let mut wall = MockWallClock::at(DAY0 + 6 * HOUR + 59 * 60);
    r.board.rain = Some(0);

    assert_eq!(r.poll(0, &wall), Some(Decision::Hold));
    wall.set(DAY0 + 7 * HOUR);
    assert_eq!(r.poll(1000, &wall), Some(Decision::Start));
    assert_eq!(r.store.last_watering(), Ok(DAY0 + 7 * HOUR));
    assert_eq!(
        r.auto.status().next_event_time,
        Some(NextEvent::StopAt { unix: DAY0 + 10 * HOUR })
    );

    // Scheduled actions switch pins without touching the relay table.
    assert_eq!(r.drain(2000), vec![(0, true, false), (1, true, false)]);
    assert!(!r.sched.registry().resolve(0).state);

    wall.set(DAY0 + 10 * HOUR);
    assert_eq!(r.poll(3000, &wall), Some(Decision::Stop(StopReason::WindowClosed)));
    assert_eq!(r.auto.phase(), Phase::Idle);
    assert_eq!(r.drain(4000), vec![(0, false, false), (1, false, false)]);
    assert_eq!(
        r.auto.status().next_event_time,
        Some(NextEvent::StartAt { unix: DAY0 + 2 * DAY + 7 * HOUR })
    );
}

#[test]
fn interval_days_gate_next_start() {
    let config = scheduled_config();
    let mut r = rig(&config, true);
    r.board.rain = Some(0);

    r.poll(0, &MockWallClock::at(DAY0 + 7 * HOUR));
    r.poll(1000, &MockWallClock::at(DAY0 + 10 * HOUR));
    r.drain(5000);

    assert_eq!(r.poll(2000, &MockWallClock::at(DAY0 + DAY + 7 * HOUR)), Some(Decision::Hold));
    assert_eq!(
        r.poll(3000, &MockWallClock::at(DAY0 + 2 * DAY + 7 * HOUR)),
        Some(Decision::Start)
    );
}

#[test]
fn last_watering_survives_restart() {
    let config = scheduled_config();
    let mut r = rig(&config, true);
    r.board.rain = Some(0);
    r.poll(0, &MockWallClock::at(DAY0 + 7 * HOUR));

    // New automation over the same store: the interval gate still holds.
    let mut auto = WateringAutomation::new(
        Arc::clone(&r.store),
        Arc::clone(&r.sched),
        Policy::from_config(&config),
        vec![0, 1],
        &config,
    );
    auto.begin();
    let wall = MockWallClock::at(DAY0 + DAY + 7 * HOUR);
    assert_eq!(auto.poll(0, &mut r.board, &wall, &mut r.sink), Some(Decision::Hold));
}

#[test]
fn rain_cancel_logged_once_per_window() {
    let config = scheduled_config();
    let mut r = rig(&config, true);
    let wall = MockWallClock::at(DAY0 + 7 * HOUR);
    r.board.rain = Some(80);

    for t in (0..5000).step_by(1000) {
        assert_eq!(r.poll(t, &wall), Some(Decision::RainCancel { level: 80 }));
    }
    assert_eq!(r.sink.count(&AppEvent::RainCancelled { level: 80 }), 1);
    assert_eq!(r.auto.phase(), Phase::Idle);
    assert!(r.sched.is_idle());

    // Dedup flags reset after the window.
    r.poll(config.dedup_reset_ms, &wall);
    assert_eq!(r.sink.count(&AppEvent::RainCancelled { level: 80 }), 2);
}

#[test]
fn rain_stops_running_cycle() {
    let config = scheduled_config();
    let mut r = rig(&config, true);
    r.board.rain = Some(10);
    r.poll(0, &MockWallClock::at(DAY0 + 7 * HOUR));
    r.drain(1000);

    r.board.rain = Some(90);
    assert_eq!(
        r.poll(1000, &MockWallClock::at(DAY0 + 8 * HOUR)),
        Some(Decision::RainCancel { level: 90 })
    );
    assert_eq!(r.auto.phase(), Phase::Idle);
    assert_eq!(r.sink.count(&AppEvent::WateringCompleted(StopReason::Rain)), 1);
    assert_eq!(r.drain(2000), vec![(0, false, false), (1, false, false)]);
}

#[test]
fn unsynced_clock_holds() {
    let config = scheduled_config();
    let mut r = rig(&config, true);
    assert_eq!(r.poll(0, &MockWallClock::unsynced()), Some(Decision::Hold));
    assert_eq!(r.auto.status().next_event_time, None);
}

// ═══════════════════════════════════════════════════════════════
//  Storage faults
// ═══════════════════════════════════════════════════════════════

#[test]
fn unreadable_enabled_flag_disables_polling() {
    let config = SystemConfig::default();
    let (store, fail_reads) = flaky_store(&config);
    store.bootstrap().unwrap();
    store.set_value(Section::State, KEY_AUTO_WATERING, true).unwrap();

    let registry = Arc::new(RelayRegistry::new(Arc::clone(&store), config.polarity));
    let sched = Arc::new(ActionScheduler::new(registry, MockClock::new(), config.lock_policy));
    let channels = config.relays.iter().map(|r| r.id).collect();
    let mut auto = WateringAutomation::new(
        Arc::clone(&store),
        Arc::clone(&sched),
        Policy::from_config(&config),
        channels,
        &config,
    );
    auto.begin();
    assert!(auto.status().enabled);

    let mut board = MockBoard::with_soil(5);
    let mut sink = RecordingSink::new();
    let wall = MockWallClock::unsynced();

    fail_reads.store(true, Ordering::SeqCst);
    assert_eq!(auto.poll(0, &mut board, &wall, &mut sink), None);
    assert_eq!(auto.phase(), Phase::Idle);
    assert!(sched.is_idle());
    assert_eq!(sink.count(&AppEvent::AutomationToggled { enabled: false }), 1);
    assert_eq!(sink.count(&AppEvent::WateringStarted), 0);
    assert!(sched.tick(10_000, &mut board).is_none());
    assert!(board.writes.is_empty());

    // Reads recover, automation picks up where the flag says.
    fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(
        auto.poll(config.threshold_poll_ms, &mut board, &wall, &mut sink),
        Some(Decision::Start)
    );
    assert_eq!(sink.count(&AppEvent::AutomationToggled { enabled: true }), 1);
    assert_eq!(auto.phase(), Phase::Watering);
}
