//! The battery simulator: shared state, periodic tick, and its thread-safe surface.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use crate::config::SimulatorConfig;
use crate::devices::{BatteryPack, Device, DeviceContext, HouseholdLoad, PvArray, WifiSignal};
use crate::error::SimError;

use super::clock::{SystemClock, TimeSource};
use super::controller::{LoadSample, ModeController};
use super::limiter::SocLimiter;
use super::mode::{ModeConfig, ModeState};
use super::types::{BatteryStatus, Snapshot};

/// Seed offsets keep the device RNG streams uncorrelated.
const PV_SEED_OFFSET: u64 = 17;
const WIFI_SEED_OFFSET: u64 = 31;
const JITTER_SEED_OFFSET: u64 = 57;

/// Longest wall-clock gap a background tick integrates over (s).
///
/// Covers host suspend and DST jumps on the local clock.
const MAX_BACKGROUND_DT_SECS: f64 = 60.0;

const WORKER_THREAD_NAME: &str = "battery-sim";

/// Everything a tick mutates. Only ever touched under the simulator's lock.
struct SimState {
    battery: BatteryPack,
    household: HouseholdLoad,
    pv: PvArray,
    wifi: WifiSignal,
    modes: ModeState,
    controller: ModeController,
    limiter: SocLimiter,
    jitter_rng: StdRng,
    jitter_pct: f64,
    target_w: f64,
    actual_w: f64,
    grid_w: f64,
    household_w: f64,
    pv_w: f64,
    wifi_rssi: i32,
    ct_connected: bool,
    ticks: u64,
    /// Clock reading of the previous background tick.
    last_tick: NaiveDateTime,
    /// Clock reading of the last state change; stamps snapshots.
    updated_at: NaiveDateTime,
}

impl SimState {
    fn new(cfg: &SimulatorConfig, now: NaiveDateTime) -> Self {
        let seed = cfg.simulation.seed;
        let battery = BatteryPack::new(&cfg.battery);
        let household = HouseholdLoad::new(&cfg.household, seed);
        let household_w = household.current_consumption();
        let pv = PvArray::new(&cfg.pv, seed.wrapping_add(PV_SEED_OFFSET));
        debug!(
            load = household.device_type(),
            source = pv.device_type(),
            pv_enabled = pv.is_enabled(),
            "devices ready"
        );
        Self {
            battery,
            household,
            pv,
            wifi: WifiSignal::new(&cfg.wifi, seed.wrapping_add(WIFI_SEED_OFFSET)),
            modes: ModeState::default(),
            controller: ModeController::from_config(cfg),
            limiter: SocLimiter::from_config(&cfg.limits),
            jitter_rng: StdRng::seed_from_u64(seed.wrapping_add(JITTER_SEED_OFFSET)),
            jitter_pct: cfg.battery.power_jitter_pct,
            target_w: 0.0,
            actual_w: 0.0,
            grid_w: household_w,
            household_w,
            pv_w: 0.0,
            wifi_rssi: cfg.wifi.base_rssi,
            ct_connected: true,
            ticks: 0,
            last_tick: now,
            updated_at: now,
        }
    }

    /// Background tick: integrates over the wall-clock time since the last one.
    fn tick(&mut self, now: NaiveDateTime) {
        let dt_secs = ((now - self.last_tick).num_milliseconds() as f64 / 1000.0)
            .clamp(0.0, MAX_BACKGROUND_DT_SECS);
        self.step(now, dt_secs);
    }

    /// One full tick covering `dt_secs` of simulated time.
    fn step(&mut self, now: NaiveDateTime, dt_secs: f64) {
        if self.modes.expire_passive(now) {
            info!("passive countdown expired, reverting to Auto");
        }

        let ctx = DeviceContext::new(now, dt_secs);
        self.household_w = self.household.power_w(&ctx);
        self.pv_w = self.pv.power_w(&ctx);

        self.compute_power(now);
        self.battery
            .integrate(self.actual_w, self.household_w, self.pv_w, ctx.dt_secs);
        self.wifi_rssi = self.wifi.sample(ctx.dt_secs);

        self.ticks += 1;
        self.last_tick = now;
        self.updated_at = now;
        debug!(
            tick = self.ticks,
            mode = %self.modes.mode,
            soc = self.battery.soc,
            target_w = self.target_w,
            actual_w = self.actual_w,
            grid_w = self.grid_w,
            "tick"
        );
    }

    /// Recomputes target, actual and grid power without advancing time.
    fn refresh(&mut self, now: NaiveDateTime) {
        let ctx = DeviceContext::new(now, 0.0);
        self.household_w = self.household.power_w(&ctx);
        self.pv_w = self.pv.power_w(&ctx);
        self.compute_power(now);
        self.updated_at = now;
    }

    fn compute_power(&mut self, now: NaiveDateTime) {
        let load = LoadSample {
            household_w: self.household_w,
            pv_w: self.pv_w,
        };
        let soc = self.battery.soc;
        self.target_w = self.controller.target_power(&self.modes, load, soc, now);
        let jittered = self.jitter(self.target_w);
        self.actual_w = self.limiter.apply(jittered, soc);
        self.grid_w = self.household_w - self.pv_w - self.actual_w;
    }

    /// Random +/- `jitter_pct` on non-zero targets, before limiting.
    fn jitter(&mut self, target_w: f64) -> f64 {
        if target_w == 0.0 || self.jitter_pct <= 0.0 {
            return target_w;
        }
        let factor: f64 = self.jitter_rng.random_range(-1.0..=1.0);
        target_w * (1.0 + factor * self.jitter_pct / 100.0)
    }

    /// Copies the state out; the passive countdown is read against `now`.
    fn snapshot(&self, now: NaiveDateTime) -> Snapshot {
        let actual_power_w = round_w(self.actual_w);
        let soc = self.battery.soc;
        Snapshot {
            timestamp: self.updated_at,
            ticks: self.ticks,
            soc,
            capacity_wh: self.battery.capacity_wh,
            mode: self.modes.mode,
            status: BatteryStatus::from_power(actual_power_w),
            target_power_w: round_w(self.target_w),
            actual_power_w,
            grid_power_w: round_w(self.grid_w),
            household_w: round_w(self.household_w),
            pv_w: round_w(self.pv_w),
            passive_remaining_secs: self
                .modes
                .passive
                .map(|p| p.remaining_secs(now)),
            ai_enabled: self.modes.ai.enabled,
            manual_schedules: self.modes.manual_schedules.values().copied().collect(),
            totals: self.battery.totals,
            wifi_rssi: self.wifi_rssi,
            battery_temp_c: self.battery.temp_c,
            ct_connected: self.ct_connected,
            charge_allowed: soc < 100.0,
            discharge_allowed: soc > self.limiter.floor_soc,
        }
    }
}

fn round_w(watts: f64) -> i32 {
    // saturating float-to-int cast; NaN maps to 0
    watts.round() as i32
}

/// Handle to the running background tick thread.
struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Thread-safe battery simulator.
///
/// All simulation state lives behind a single lock that is held for the
/// whole of each tick and each accessor call. Callers only ever receive
/// copied [`Snapshot`]s, so no read can mix values from two ticks.
///
/// # Examples
///
/// ```
/// use venus_sim::config::SimulatorConfig;
/// use venus_sim::sim::engine::BatterySimulator;
/// use venus_sim::sim::mode::{ModeConfig, PassiveConfig};
///
/// let sim = BatterySimulator::new(&SimulatorConfig::quiet()).unwrap();
/// sim.set_mode(ModeConfig::Passive(PassiveConfig { power_w: -1400, cd_time_secs: 600 }))
///     .unwrap();
/// assert_eq!(sim.get_state().bat_power_wire(), 1400);
/// ```
pub struct BatterySimulator {
    config: SimulatorConfig,
    state: Arc<Mutex<SimState>>,
    clock: Arc<dyn TimeSource>,
    tick_interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl BatterySimulator {
    /// Builds a simulator on the host's local clock.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] listing every invalid field.
    pub fn new(config: &SimulatorConfig) -> Result<Self, SimError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds a simulator reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] listing every invalid field.
    pub fn with_clock(
        config: &SimulatorConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, SimError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(SimError::InvalidConfig(errors));
        }
        let now = clock.now();
        Ok(Self {
            config: config.clone(),
            state: Arc::new(Mutex::new(SimState::new(config, now))),
            clock,
            tick_interval: Duration::from_millis(config.simulation.tick_interval_ms),
            worker: Mutex::new(None),
        })
    }

    /// Spawns the background tick thread. A no-op if it is already running.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Spawn`] if the OS refuses to create the thread.
    pub fn start(&self) -> Result<(), SimError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            debug!("simulator already running");
            return Ok(());
        }

        self.state.lock().last_tick = self.clock.now();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let interval = self.tick_interval;
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let now = clock.now();
                            state.lock().tick(now);
                        }
                        // a stop message or a dropped sender both end the loop
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(SimError::Spawn)?;

        *worker = Some(Worker { stop_tx, handle });
        info!(interval_ms = interval.as_millis() as u64, "simulator started");
        Ok(())
    }

    /// Stops the background thread and waits for it to exit.
    ///
    /// Returns only once no tick is in flight, so state read afterwards is
    /// frozen. Safe to call when the simulator was never started.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::WorkerPanicked`] if the tick thread panicked.
    pub fn stop(&self) -> Result<(), SimError> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        // the worker may already be gone; join below still reports how it ended
        let _ = worker.stop_tx.send(());
        worker
            .handle
            .join()
            .map_err(|_| SimError::WorkerPanicked)?;
        info!("simulator stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Returns a consistent copy of the current state.
    pub fn get_state(&self) -> Snapshot {
        let now = self.clock.now();
        self.state.lock().snapshot(now)
    }

    /// Switches mode and immediately recomputes power.
    ///
    /// The configuration is validated before the lock is taken; on error
    /// nothing changes. On success the very next [`Self::get_state`] sees
    /// the new mode's power. SOC is not advanced.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] naming the offending field.
    pub fn set_mode(&self, config: ModeConfig) -> Result<(), SimError> {
        config.validate()?;
        let now = self.clock.now();
        let mut state = self.state.lock();
        let previous = state.modes.mode;
        state.modes.apply(config, now);
        state.refresh(now);
        info!(
            from = %previous,
            to = %state.modes.mode,
            target_w = state.target_w,
            actual_w = state.actual_w,
            "mode set"
        );
        Ok(())
    }

    /// Runs one tick synchronously, integrating over `elapsed`.
    ///
    /// Intended for tests and diagnostics; the time-of-day inputs still come
    /// from the simulator's clock.
    pub fn advance(&self, elapsed: Duration) -> Snapshot {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.step(now, elapsed.as_secs_f64());
        state.snapshot(now)
    }

    /// Injects a cooking event into the household load.
    pub fn force_cooking_event(&self, power_w: f64, duration: Duration) {
        self.state
            .lock()
            .household
            .force_cooking_event(power_w, duration.as_secs_f64());
    }

    /// Simulates plugging or unplugging the CT clamp.
    pub fn set_ct_connected(&self, connected: bool) {
        self.state.lock().ct_connected = connected;
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}

impl Drop for BatterySimulator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "simulator did not shut down cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::sim::clock::ManualClock;
    use crate::sim::mode::{Mode, PassiveConfig};

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    fn quiet_sim() -> (BatterySimulator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(noon()));
        let sim = BatterySimulator::with_clock(&SimulatorConfig::quiet(), clock.clone())
            .expect("quiet config is valid");
        (sim, clock)
    }

    fn passive(power_w: i32, cd_time_secs: i64) -> ModeConfig {
        ModeConfig::Passive(PassiveConfig {
            power_w,
            cd_time_secs,
        })
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = SimulatorConfig::quiet();
        cfg.battery.capacity_wh = -1.0;
        assert!(matches!(
            BatterySimulator::new(&cfg),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn starts_in_auto_at_initial_soc() {
        let (sim, _) = quiet_sim();
        let s = sim.get_state();
        assert_eq!(s.mode, Mode::Auto);
        assert_eq!(s.soc, 50.0);
        assert_eq!(s.ticks, 0);
        assert!(s.passive_remaining_secs.is_none());
    }

    #[test]
    fn set_mode_takes_effect_before_next_tick() {
        let (sim, _) = quiet_sim();
        sim.set_mode(passive(-1400, 300)).expect("valid");
        let s = sim.get_state();
        assert_eq!(s.mode, Mode::Passive);
        assert_eq!(s.actual_power_w, -1400);
        assert_eq!(s.grid_power_w, 200 + 1400);
        assert_eq!(s.status, BatteryStatus::Charging);
        // no time has passed
        assert_eq!(s.soc, 50.0);
        assert_eq!(s.passive_remaining_secs, Some(300));
    }

    #[test]
    fn rejected_set_mode_leaves_state_alone() {
        let (sim, _) = quiet_sim();
        sim.set_mode(passive(1000, 300)).expect("valid");
        let before = sim.get_state();
        let err = sim.set_mode(passive(-1000, 0));
        assert!(matches!(err, Err(SimError::Config(ref e)) if e.field == "passive_cfg.cd_time"));
        let after = sim.get_state();
        assert_eq!(after.mode, Mode::Passive);
        assert_eq!(after.actual_power_w, before.actual_power_w);
    }

    #[test]
    fn auto_tracks_household_load() {
        let (sim, _) = quiet_sim();
        let s = sim.advance(Duration::from_secs(1));
        assert_eq!(s.household_w, 200);
        assert_eq!(s.actual_power_w, 200);
        assert_eq!(s.grid_power_w, 0);
    }

    #[test]
    fn passive_expiry_reverts_on_next_tick() {
        let (sim, clock) = quiet_sim();
        sim.set_mode(passive(-1400, 60)).expect("valid");
        clock.advance(TimeDelta::seconds(61));
        let s = sim.advance(Duration::from_secs(1));
        assert_eq!(s.mode, Mode::Auto);
        assert!(s.passive_remaining_secs.is_none());
        assert_eq!(s.actual_power_w, 200);
    }

    #[test]
    fn tick_count_and_timestamp_advance() {
        let (sim, clock) = quiet_sim();
        clock.advance(TimeDelta::seconds(5));
        let s = sim.advance(Duration::from_secs(5));
        assert_eq!(s.ticks, 1);
        assert_eq!(s.timestamp, noon() + TimeDelta::seconds(5));
    }

    #[test]
    fn background_dt_follows_clock() {
        let (sim, clock) = quiet_sim();
        sim.set_mode(passive(-2560, 7200)).expect("valid");
        clock.advance(TimeDelta::seconds(36));
        sim.state.lock().tick(clock.now());
        // 36 s at 2560 W on 5120 Wh is +0.5 %
        let soc = sim.get_state().soc;
        assert!((soc - 50.5).abs() < 1e-9, "got {soc}");
    }

    #[test]
    fn passive_countdown_follows_clock_between_ticks() {
        let (sim, clock) = quiet_sim();
        sim.set_mode(passive(-1000, 60)).expect("valid");
        clock.advance(TimeDelta::seconds(45));
        let s = sim.get_state();
        assert_eq!(s.passive_remaining_secs, Some(15));
        assert_eq!(s.ticks, 0);
    }

    #[test]
    fn ct_state_is_reported() {
        let (sim, _) = quiet_sim();
        sim.set_ct_connected(false);
        assert!(!sim.get_state().ct_connected);
    }

    #[test]
    fn jitter_stays_within_band() {
        let clock = Arc::new(ManualClock::new(noon()));
        let cfg = SimulatorConfig {
            household: SimulatorConfig::quiet().household,
            ..SimulatorConfig::default()
        };
        let sim = BatterySimulator::with_clock(&cfg, clock).expect("valid");
        sim.set_mode(passive(1000, 3600)).expect("valid");
        for _ in 0..200 {
            let w = sim.advance(Duration::from_millis(10)).actual_power_w;
            assert!((950..=1050).contains(&w), "got {w}");
        }
    }

    #[test]
    fn stop_without_start_is_ok() {
        let (sim, _) = quiet_sim();
        assert!(!sim.is_running());
        assert!(sim.stop().is_ok());
    }
}
