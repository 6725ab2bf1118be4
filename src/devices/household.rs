use chrono::Timelike;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::HouseholdConfig;
use crate::devices::types::{Device, DeviceContext};

/// Seconds between random-event rolls.
const EVENT_CHECK_SECS: f64 = 30.0;
/// Hours where cooking is four times as likely.
const MEAL_HOURS: [u32; 7] = [7, 8, 12, 13, 18, 19, 20];
const COOKING_CHANCE: f64 = 0.05;
const MEAL_COOKING_CHANCE: f64 = 0.20;
const APPLIANCE_CHANCE: f64 = 0.03;

/// Appliance catalogue: name, power range (W), duration range (min).
const APPLIANCES: [(&str, (u32, u32), (u32, u32)); 7] = [
    ("washing machine", (400, 800), (30, 60)),
    ("dryer", (2000, 3000), (45, 90)),
    ("dishwasher", (1200, 1800), (60, 120)),
    ("vacuum cleaner", (800, 1500), (10, 30)),
    ("iron", (1000, 2000), (10, 20)),
    ("kettle", (2000, 3000), (2, 5)),
    ("microwave", (800, 1200), (2, 10)),
];

/// What kind of temporary load an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Cooking,
    Appliance,
}

/// A temporary load added on top of the household baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadEvent {
    pub kind: EventKind,
    pub label: &'static str,
    /// Additional consumption while active (W).
    pub power_delta_w: f64,
    /// Simulated seconds left before the event ends.
    pub remaining_secs: f64,
}

/// Second-by-second random walk layered on top of the load.
#[derive(Debug, Clone, Default)]
struct Fluctuation {
    from_w: f64,
    to_w: f64,
    /// Seconds since the current target was picked.
    elapsed_secs: f64,
    /// Seconds the current target is held before a new one is drawn.
    hold_secs: f64,
}

impl Fluctuation {
    /// Advances the walk and returns the interpolated offset (W).
    fn step(&mut self, rng: &mut StdRng, dt_secs: f64) -> f64 {
        self.elapsed_secs += dt_secs;
        if self.elapsed_secs > self.hold_secs {
            self.elapsed_secs = 0.0;
            self.hold_secs = rng.random_range(0.5..=2.0);
            self.from_w = self.to_w;
            self.to_w = if rng.random_bool(0.1) {
                let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
                let spike = sign * f64::from(rng.random_range(50..=200));
                (self.from_w + spike).clamp(-100.0, 300.0)
            } else {
                let drift = f64::from(rng.random_range(-20..=20));
                (self.from_w + drift).clamp(-50.0, 150.0)
            };
        }
        // 1 s linear transition toward the target
        let progress = self.elapsed_secs.min(1.0);
        self.from_w + (self.to_w - self.from_w) * progress
    }
}

/// Household consumption as seen by a P1 meter.
///
/// Combines a constant baseline, a time-of-day component, random cooking
/// and appliance events, and a micro-fluctuation random walk. Event timing
/// runs on simulated seconds (`dt_secs`) so a test can fast-forward it.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use venus_sim::config::SimulatorConfig;
/// use venus_sim::devices::{DeviceContext, HouseholdLoad};
///
/// let cfg = SimulatorConfig::quiet();
/// let mut house = HouseholdLoad::new(&cfg.household, 42);
/// let noon = NaiveDate::from_ymd_opt(2024, 6, 3)
///     .and_then(|d| d.and_hms_opt(12, 0, 0))
///     .unwrap();
/// assert_eq!(house.sample(&DeviceContext::new(noon, 1.0)), 200.0);
/// ```
#[derive(Debug, Clone)]
pub struct HouseholdLoad {
    cfg: HouseholdConfig,
    rng: StdRng,
    events: Vec<LoadEvent>,
    /// Simulated seconds since the last event roll.
    since_event_check_secs: f64,
    fluctuation: Fluctuation,
    current_w: f64,
}

impl HouseholdLoad {
    /// Creates a household generator.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Baseline, floor and enabled variation components
    /// * `seed` - Random seed for reproducible load traces
    pub fn new(cfg: &HouseholdConfig, seed: u64) -> Self {
        Self {
            cfg: cfg.clone(),
            rng: StdRng::seed_from_u64(seed),
            events: Vec::new(),
            // first sample rolls for events straight away
            since_event_check_secs: EVENT_CHECK_SECS,
            fluctuation: Fluctuation::default(),
            current_w: cfg.base_load_w.max(cfg.min_load_w),
        }
    }

    /// Advances the generator by `ctx.dt_secs` and returns consumption (W).
    ///
    /// The result never drops below `min_load_w`.
    pub fn sample(&mut self, ctx: &DeviceContext) -> f64 {
        let dt = ctx.dt_secs;

        if self.cfg.random_events {
            self.since_event_check_secs += dt;
            if self.since_event_check_secs >= EVENT_CHECK_SECS {
                self.since_event_check_secs = 0.0;
                self.roll_events(ctx.now.hour());
            }
        }

        let mut watts = self.cfg.base_load_w;
        if self.cfg.time_of_day_variation {
            watts += self.time_of_day_w(ctx.now.hour());
        }
        watts += self.event_power_w(dt);
        self.expire_events(dt);
        if self.cfg.micro_fluctuation {
            watts += self.fluctuation.step(&mut self.rng, dt);
        }

        self.current_w = watts.max(self.cfg.min_load_w);
        self.current_w
    }

    /// Starts a cooking event, replacing any cooking already in progress.
    pub fn force_cooking_event(&mut self, power_w: f64, duration_secs: f64) {
        self.events.retain(|e| e.kind != EventKind::Cooking);
        self.events.push(LoadEvent {
            kind: EventKind::Cooking,
            label: "cooking",
            power_delta_w: power_w.max(0.0),
            remaining_secs: duration_secs.max(0.0),
        });
        info!(power_w, duration_secs, "forced cooking event");
    }

    /// Consumption reported by the most recent sample.
    pub fn current_consumption(&self) -> f64 {
        self.current_w
    }

    pub fn active_events(&self) -> &[LoadEvent] {
        &self.events
    }

    /// Average event power over the next `dt_secs`.
    ///
    /// An event ending inside the interval counts for the share it was active.
    fn event_power_w(&self, dt_secs: f64) -> f64 {
        self.events
            .iter()
            .map(|e| {
                if dt_secs > 0.0 {
                    e.power_delta_w * e.remaining_secs.min(dt_secs) / dt_secs
                } else {
                    e.power_delta_w
                }
            })
            .sum()
    }

    fn expire_events(&mut self, dt_secs: f64) {
        for event in &mut self.events {
            event.remaining_secs -= dt_secs;
        }
        self.events.retain(|e| e.remaining_secs > 0.0);
    }

    fn has_event(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    fn roll_events(&mut self, hour: u32) {
        if !self.has_event(EventKind::Cooking) {
            let chance = if MEAL_HOURS.contains(&hour) {
                MEAL_COOKING_CHANCE
            } else {
                COOKING_CHANCE
            };
            if self.rng.random_bool(chance) {
                let power_w = f64::from(self.rng.random_range(1500..=3000));
                let minutes = self.rng.random_range(5..=30);
                self.start_event(EventKind::Cooking, "cooking", power_w, minutes);
            }
        }

        if !self.has_event(EventKind::Appliance) && self.rng.random_bool(APPLIANCE_CHANCE) {
            let (label, (lo_w, hi_w), (lo_min, hi_min)) =
                APPLIANCES[self.rng.random_range(0..APPLIANCES.len())];
            let power_w = f64::from(self.rng.random_range(lo_w..=hi_w));
            let minutes = self.rng.random_range(lo_min..=hi_min);
            self.start_event(EventKind::Appliance, label, power_w, minutes);
        }
    }

    fn start_event(&mut self, kind: EventKind, label: &'static str, power_w: f64, minutes: u32) {
        debug!(event = label, power_w, minutes, "household event started");
        self.events.push(LoadEvent {
            kind,
            label,
            power_delta_w: power_w,
            remaining_secs: f64::from(minutes) * 60.0,
        });
    }

    fn time_of_day_w(&mut self, hour: u32) -> f64 {
        let (lo, hi) = match hour {
            6..=8 => (200, 500),   // morning
            9..=16 => (50, 150),   // nobody home
            17..=21 => (300, 800), // evening peak
            _ => (0, 50),
        };
        f64::from(self.rng.random_range(lo..=hi))
    }
}

impl Device for HouseholdLoad {
    fn power_w(&mut self, context: &DeviceContext) -> f64 {
        self.sample(context)
    }

    fn device_type(&self) -> &'static str {
        "Household"
    }
}
