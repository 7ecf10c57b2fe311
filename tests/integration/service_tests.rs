//! AppService: boot, command dispatch and the combined control-loop tick.

use std::sync::Arc;

use embedded_hal::digital::PinState;
use microbox::adapters::fs::MemFs;
use microbox::app::commands::{AppCommand, CommandOutcome};
use microbox::app::events::AppEvent;
use microbox::app::service::AppService;
use microbox::config::{AutomationVariant, SystemConfig};
use microbox::store::{ConfigStore, KEY_AUTO_CHANGE, Section};
use microbox::watering::Policy;

use super::mock_hw::{MockBoard, MockClock, MockWallClock, RecordingSink, memory_store};

fn service(
    config: &SystemConfig,
    store: &Arc<ConfigStore<MemFs>>,
    clock: &MockClock,
) -> AppService<MemFs, MockClock> {
    AppService::new(config, Arc::clone(store), clock.clone(), Policy::from_config(config))
}

fn started() -> (AppService<MemFs, MockClock>, MockClock, MockBoard, RecordingSink) {
    let config = SystemConfig::default();
    let store = memory_store(&config);
    let clock = MockClock::new();
    let mut app = service(&config, &store, &clock);
    let mut board = MockBoard::new();
    let mut sink = RecordingSink::new();
    app.start(&mut board, &mut sink);
    (app, clock, board, sink)
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn start_bootstraps_and_restores_relays_off() {
    let (app, _clock, board, sink) = started();

    for section in Section::ALL {
        assert!(app.store().read(section).is_ok(), "{} written at boot", section);
    }
    // Active-low board: off is a high pin.
    assert_eq!(board.level(13), Some(PinState::High));
    assert_eq!(board.level(14), Some(PinState::High));
    assert_eq!(
        sink.events,
        vec![AppEvent::Started {
            channels: 2,
            in_progress: false
        }]
    );
    assert!(!app.status().enabled);
}

#[test]
fn persisted_watering_resumes_after_reboot() {
    let config = SystemConfig::default();
    let store = memory_store(&config);
    let clock = MockClock::new();
    let wall = MockWallClock::unsynced();

    {
        let mut app = service(&config, &store, &clock);
        let mut board = MockBoard::with_soil(5);
        let mut sink = RecordingSink::new();
        app.start(&mut board, &mut sink);
        assert!(app.handle_command(AppCommand::SetAutoWatering(true)).is_accepted());
        for t in [0, 1000, 1050] {
            app.tick(t, &mut board, &wall, &mut sink);
        }
        assert!(app.scheduler().is_idle());
    }

    let mut app = service(&config, &store, &clock);
    let mut board = MockBoard::new();
    let mut sink = RecordingSink::new();
    app.start(&mut board, &mut sink);
    assert_eq!(board.level(13), Some(PinState::Low));
    assert_eq!(board.level(14), Some(PinState::Low));
    assert!(app.status().in_progress);
}

// ── Control loop ──────────────────────────────────────────────

#[test]
fn tick_runs_automation_then_scheduler() {
    let (mut app, _clock, mut board, mut sink) = started();
    let wall = MockWallClock::unsynced();
    app.handle_command(AppCommand::SetAutoWatering(true));
    board.soil = Some(12);

    assert!(app.tick(0, &mut board, &wall, &mut sink).is_none());
    assert!(sink.events.contains(&AppEvent::WateringStarted));
    assert_eq!(app.scheduler().pending(), 2);

    let first = app.tick(1000, &mut board, &wall, &mut sink).unwrap();
    let second = app.tick(1050, &mut board, &wall, &mut sink).unwrap();
    assert_eq!((first.action.channel.id, second.action.channel.id), (0, 1));
    assert_eq!(board.level(13), Some(PinState::Low));
    assert_eq!(app.tick_count(), 3);
}

#[test]
fn automation_actions_are_due_relative_to_tick_time() {
    let (mut app, clock, mut board, mut sink) = started();
    let wall = MockWallClock::unsynced();
    // Scheduler clock far ahead of the loop's time base.
    clock.set(100_000);
    app.handle_command(AppCommand::SetAutoWatering(true));
    board.soil = Some(12);

    assert!(app.tick(0, &mut board, &wall, &mut sink).is_none());
    assert_eq!(app.scheduler().next_due(), Some(1000));
    assert!(app.tick(999, &mut board, &wall, &mut sink).is_none());
    let first = app.tick(1000, &mut board, &wall, &mut sink).unwrap();
    assert_eq!(first.action.enqueued_at, 0);
    assert!(first.switched);
}

#[test]
fn state_reset_clears_schedule_memory() {
    const DAY0: u64 = 1_736_467_200;
    const HOUR: u64 = 3600;

    let config = SystemConfig {
        variant: AutomationVariant::Scheduled,
        ..SystemConfig::default()
    };
    let store = memory_store(&config);
    let clock = MockClock::new();
    let mut app = service(&config, &store, &clock);
    let mut board = MockBoard::new();
    board.rain = Some(0);
    let mut sink = RecordingSink::new();
    app.start(&mut board, &mut sink);
    assert!(app.handle_command(AppCommand::SetAutoWatering(true)).is_accepted());

    let mut wall = MockWallClock::at(DAY0 + 7 * HOUR);
    app.tick(0, &mut board, &wall, &mut sink);
    app.tick(1000, &mut board, &wall, &mut sink);
    app.tick(1050, &mut board, &wall, &mut sink);
    assert!(app.status().in_progress);
    assert_eq!(store.last_watering(), Ok(DAY0 + 7 * HOUR));

    wall.set(DAY0 + 10 * HOUR);
    app.tick(2000, &mut board, &wall, &mut sink);
    app.tick(3000, &mut board, &wall, &mut sink);
    app.tick(3050, &mut board, &wall, &mut sink);
    assert!(!app.status().in_progress);

    assert!(app.handle_command(AppCommand::ResetSection(Section::State)).is_accepted());
    assert_eq!(store.last_watering(), Ok(0));
    assert!(app.handle_command(AppCommand::SetAutoWatering(true)).is_accepted());

    // One day later: inside the two-day interval only if the old start
    // time were still remembered.
    wall.set(DAY0 + 24 * HOUR + 7 * HOUR);
    app.tick(4000, &mut board, &wall, &mut sink);
    assert!(app.status().in_progress);
    assert_eq!(store.last_watering(), Ok(DAY0 + 31 * HOUR));
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn manual_relay_command_is_queued() {
    let (mut app, _clock, mut board, mut sink) = started();
    let wall = MockWallClock::unsynced();

    let cmd = AppCommand::SetRelay {
        channel: 1,
        state: true,
        delay_ms: 0,
        persist: true,
    };
    assert_eq!(app.handle_command(cmd), CommandOutcome::Accepted);
    let done = app.tick(10, &mut board, &wall, &mut sink).unwrap();
    assert!(done.persisted);
    assert!(app.scheduler().registry().resolve(1).state);

    let unknown = AppCommand::SetRelay {
        channel: 5,
        state: true,
        delay_ms: 0,
        persist: false,
    };
    assert!(!app.handle_command(unknown).is_accepted());
}

#[test]
fn wifi_credentials_validated_and_stored() {
    let (mut app, ..) = started();

    let bad = AppCommand::SetWifiSta {
        ssid: String::new(),
        psk: "x".into(),
    };
    assert!(matches!(app.handle_command(bad), CommandOutcome::Rejected(_)));

    let good = AppCommand::SetWifiSta {
        ssid: "garden".into(),
        psk: "tulips42".into(),
    };
    assert!(app.handle_command(good).is_accepted());
    let creds = app.store().wifi_credentials().unwrap();
    assert_eq!((creds.ssid_sta.as_str(), creds.psk_sta.as_str()), ("garden", "tulips42"));
    assert_eq!(creds.ssid_ap, "MicroBox");
}

#[test]
fn relay_edits_and_section_reset() {
    let (mut app, ..) = started();

    let blank = AppCommand::RenameRelay {
        channel: 0,
        label: "   ".into(),
    };
    assert!(!app.handle_command(blank).is_accepted());

    let rename = AppCommand::RenameRelay {
        channel: 0,
        label: "Lawn".into(),
    };
    assert!(app.handle_command(rename).is_accepted());
    assert_eq!(app.scheduler().registry().resolve(0).label, "Lawn");

    let clash = AppCommand::SetRelayPin { channel: 0, pin: 14 };
    assert!(!app.handle_command(clash).is_accepted());

    for pin in [34, 39, 40] {
        let input_only = AppCommand::SetRelayPin { channel: 0, pin };
        assert!(!app.handle_command(input_only).is_accepted(), "pin {}", pin);
    }
    assert_eq!(app.scheduler().registry().resolve(0).pin, Some(13));
    let moved = AppCommand::SetRelayPin { channel: 0, pin: 27 };
    assert!(app.handle_command(moved).is_accepted());
    assert_eq!(app.scheduler().registry().resolve(0).pin, Some(27));

    assert!(app.handle_command(AppCommand::ResetSection(Section::Relay)).is_accepted());
    assert_eq!(app.scheduler().registry().resolve(0).label, "Relay 1");
}

#[test]
fn auto_mode_change_flag_round_trips() {
    let (mut app, ..) = started();
    assert_eq!(app.store().read_flag(Section::State, KEY_AUTO_CHANGE), Ok(false));
    assert!(app.handle_command(AppCommand::SetAutoModeChange(true)).is_accepted());
    assert_eq!(app.store().read_flag(Section::State, KEY_AUTO_CHANGE), Ok(true));
}
