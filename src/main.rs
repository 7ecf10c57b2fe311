//! MicroBox Firmware: main entry point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   FlashFs       Esp32Time      │
//! │  (Sensor+Gpio)     (EventSink)    (Filesystem)  (Clock+Wall)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  ConfigStore · RelayRegistry · ActionScheduler         │    │
//! │  │  WateringAutomation (threshold | scheduled)            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};

use microbox::adapters::fs::FlashFs;
use microbox::adapters::gpio::Esp32Gpio;
use microbox::adapters::hardware::HardwareAdapter;
use microbox::adapters::log_sink::LogEventSink;
use microbox::adapters::time::Esp32TimeAdapter;
use microbox::app::service::AppService;
use microbox::config::SystemConfig;
use microbox::error::Error;
use microbox::pins;
use microbox::store::{ConfigStore, StoreDefaults};
use microbox::watering::Policy;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MicroBox v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Build-time configuration ───────────────────────────
    let config = SystemConfig::default();
    config.validate().map_err(Error::Config)?;
    info!(
        "Config: {:?} automation, {} relays, poll every {} ms",
        config.variant,
        config.relays.len(),
        config.poll_interval_ms()
    );

    // ── 3. Flash filesystem + config store ────────────────────
    let fs = match FlashFs::mount() {
        Ok(fs) => fs,
        Err(e) => {
            // Task watchdog resets the board.
            error!("Flash mount failed: {}, halting", e);
            loop {
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    };
    let store = Arc::new(ConfigStore::new(
        fs,
        StoreDefaults::from_config(&config),
        config.lock_policy,
    ));

    // ── 4. Construct adapters ─────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut hw = HardwareAdapter::new(
        Esp32Gpio::new(),
        Some(pins::SOIL_ADC_GPIO),
        Some(pins::RAIN_ADC_GPIO),
        pins::SOIL_CALIBRATION,
        pins::ADC_FULL_SCALE,
    );
    let mut log_sink = LogEventSink::new();

    // ── 5. Application service ────────────────────────────────
    let mut app = AppService::new(&config, store, clock.clone(), Policy::from_config(&config));
    app.start(&mut hw, &mut log_sink);

    if clock.now_local().is_none() {
        warn!("Wall clock not set; scheduled watering waits for time sync");
    }

    // ── 6. Main loop ──────────────────────────────────────────
    let period = Duration::from_millis(config.loop_interval_ms);
    loop {
        let now = clock.uptime_ms();
        if let Some(done) = app.tick(now, &mut hw, &clock, &mut log_sink) {
            info!(
                "Loop: relay {} -> {}",
                done.action.channel.id,
                if done.action.desired_state { "ON" } else { "OFF" }
            );
        }
        std::thread::sleep(period);
    }
}
