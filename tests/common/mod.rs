//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use venus_sim::config::SimulatorConfig;
use venus_sim::sim::clock::ManualClock;
use venus_sim::sim::engine::BatterySimulator;
use venus_sim::sim::mode::{ManualSchedule, ModeConfig, PassiveConfig, WeekMask};

/// Monday 2024-06-03 at the given time.
pub fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid date")
}

/// Simulator on a manual clock stopped at Monday noon.
pub fn sim_at_noon(config: &SimulatorConfig) -> (BatterySimulator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(monday_at(12, 0)));
    let sim = BatterySimulator::with_clock(config, clock.clone()).expect("valid config");
    (sim, clock)
}

/// Deterministic simulator: flat 200 W household, no jitter, no PV.
pub fn quiet_sim() -> (BatterySimulator, Arc<ManualClock>) {
    sim_at_noon(&SimulatorConfig::quiet())
}

pub fn passive(power_w: i32, cd_time_secs: i64) -> ModeConfig {
    ModeConfig::Passive(PassiveConfig {
        power_w,
        cd_time_secs,
    })
}

/// A manual slot active all day, every day.
pub fn all_day_slot(time_num: u8, power_w: i32) -> ModeConfig {
    ModeConfig::Manual(ManualSchedule {
        time_num,
        start_time: NaiveTime::MIN,
        end_time: NaiveTime::from_hms_opt(23, 59, 0).expect("valid time"),
        week_set: WeekMask::ALL,
        power_w,
        enabled: true,
    })
}
