//! Application service: the hexagonal core.
//!
//! [`AppService`] wires the config store, relay registry, action scheduler
//! and watering automation together and exposes a hardware-agnostic API.
//! All I/O flows through port traits injected at call sites.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          AppService          │
//!    GpioPort ◀── │ Automation → ActionScheduler │
//!                 │       ConfigStore (Arc)      │
//!                 └──────────────────────────────┘
//! ```
//!
//! Each [`tick`](AppService::tick) runs the automation poll first and the
//! scheduler second, so actions enqueued by a transition become eligible
//! in the same iteration.

use std::sync::Arc;

use log::{info, log, warn};

use crate::config::SystemConfig;
use crate::pins::MAX_OUTPUT_GPIO;
use crate::error::StoreError;
use crate::relay::RelayRegistry;
use crate::scheduler::{ActionScheduler, ExecutedAction};
use crate::store::{ConfigStore, KEY_AUTO_CHANGE, KEY_AUTO_WATERING, Section};
use crate::watering::{AutomationStatus, Policy, TriggerPolicy, WateringAutomation};

use super::commands::{AppCommand, CommandOutcome};
use super::events::AppEvent;
use super::ports::{ClockPort, EventSink, FilesystemPort, GpioPort, SensorPort, WallClockPort};

const MAX_SSID_LEN: usize = 32;
const MAX_PSK_LEN: usize = 64;
const MAX_LABEL_LEN: usize = 24;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService<F, C, P = Policy> {
    store: Arc<ConfigStore<F>>,
    scheduler: Arc<ActionScheduler<F, C>>,
    automation: WateringAutomation<F, C, P>,
    tick_count: u64,
}

impl<F: FilesystemPort, C: ClockPort, P: TriggerPolicy> AppService<F, C, P> {
    /// Construct the service.  Does **not** touch hardware; call
    /// [`start`](Self::start) next.
    pub fn new(config: &SystemConfig, store: Arc<ConfigStore<F>>, clock: C, policy: P) -> Self {
        let registry = Arc::new(RelayRegistry::new(Arc::clone(&store), config.polarity));
        let scheduler = Arc::new(ActionScheduler::new(registry, clock, config.lock_policy));
        let channels = config.relays.iter().map(|r| r.id).collect();
        let automation = WateringAutomation::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            policy,
            channels,
            config,
        );

        Self {
            store,
            scheduler,
            automation,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise missing sections, drive relays to their persisted states
    /// and load the automation.
    pub fn start(&mut self, gpio: &mut dyn GpioPort, sink: &mut impl EventSink) {
        match self.store.bootstrap() {
            Ok(0) => {}
            Ok(n) => info!("AppService: {} config sections initialised", n),
            Err(e) => log!(e.severity().level(), "AppService: bootstrap failed: {}", e),
        }
        let channels = self.scheduler.registry().restore(gpio);
        self.automation.begin();

        let in_progress = self.automation.status().in_progress;
        sink.emit(&AppEvent::Started {
            channels,
            in_progress,
        });
        info!("AppService started ({} relays restored)", channels);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One control-loop iteration: automation poll, then scheduler tick.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + GpioPort),
        wall: &dyn WallClockPort,
        sink: &mut impl EventSink,
    ) -> Option<ExecutedAction> {
        self.tick_count += 1;
        self.automation.poll(now_ms, hw, wall, sink);
        self.scheduler.tick(now_ms, hw)
    }

    // ── Command dispatch ──────────────────────────────────────

    pub fn handle_command(&mut self, cmd: AppCommand) -> CommandOutcome {
        info!("AppService: command {:?}", RedactedCommand(&cmd));
        match cmd {
            AppCommand::SetRelay {
                channel,
                state,
                delay_ms,
                persist,
            } => {
                if self.scheduler.enqueue(channel, state, delay_ms, persist) {
                    CommandOutcome::Accepted
                } else {
                    CommandOutcome::Rejected("relay action not queued")
                }
            }
            AppCommand::SetAutoWatering(on) => store_outcome(self.store.set_value(Section::State, KEY_AUTO_WATERING, on)),
            AppCommand::SetAutoModeChange(on) => store_outcome(self.store.set_value(Section::State, KEY_AUTO_CHANGE, on)),
            AppCommand::SetWifiSta { ssid, psk } => match validate_credentials(&ssid, &psk) {
                Err(why) => CommandOutcome::Rejected(why),
                Ok(()) => store_outcome(self.store.set_wifi_sta(&ssid, &psk)),
            },
            AppCommand::SetWifiAp { ssid, psk } => match validate_credentials(&ssid, &psk) {
                Err(why) => CommandOutcome::Rejected(why),
                Ok(()) => store_outcome(self.store.set_wifi_ap(&ssid, &psk)),
            },
            AppCommand::RenameRelay { channel, label } => {
                if label.trim().is_empty() || label.chars().count() > MAX_LABEL_LEN {
                    return CommandOutcome::Rejected("label must be 1-24 characters");
                }
                channel_outcome(self.scheduler.registry().set_label(channel, label.trim()))
            }
            AppCommand::SetRelayPin { channel, pin } => {
                if pin > MAX_OUTPUT_GPIO {
                    return CommandOutcome::Rejected("pin is not output-capable");
                }
                channel_outcome(self.scheduler.registry().set_pin(channel, pin))
            }
            AppCommand::ResetSection(section) => {
                let outcome = store_outcome(self.store.reset_section(section));
                if outcome.is_accepted() && section == Section::State {
                    self.automation.reload_last_watering();
                }
                outcome
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> AutomationStatus {
        self.automation.status()
    }

    pub fn store(&self) -> &Arc<ConfigStore<F>> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<ActionScheduler<F, C>> {
        &self.scheduler
    }

    pub fn automation(&self) -> &WateringAutomation<F, C, P> {
        &self.automation
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

fn validate_credentials(ssid: &str, psk: &str) -> Result<(), &'static str> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
        return Err("ssid must be 1-32 bytes");
    }
    if psk.len() > MAX_PSK_LEN {
        return Err("psk must be at most 64 bytes");
    }
    Ok(())
}

fn store_outcome(result: Result<(), StoreError>) -> CommandOutcome {
    match result {
        Ok(()) => CommandOutcome::Accepted,
        Err(e) => {
            log!(e.severity().level(), "AppService: store write failed: {}", e);
            CommandOutcome::Rejected("config store unavailable")
        }
    }
}

fn channel_outcome(result: Result<bool, StoreError>) -> CommandOutcome {
    match result {
        Ok(true) => CommandOutcome::Accepted,
        Ok(false) => {
            warn!("AppService: relay channel not found or pin in use");
            CommandOutcome::Rejected("unknown relay channel or pin in use")
        }
        Err(e) => store_outcome(Err(e)),
    }
}

/// `Debug` view of a command with credentials masked.
struct RedactedCommand<'a>(&'a AppCommand);

impl core::fmt::Debug for RedactedCommand<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            AppCommand::SetWifiSta { ssid, .. } => write!(f, "SetWifiSta {{ ssid: {:?}, psk: *** }}", ssid),
            AppCommand::SetWifiAp { ssid, .. } => write!(f, "SetWifiAp {{ ssid: {:?}, psk: *** }}", ssid),
            other => write!(f, "{:?}", other),
        }
    }
}
