use chrono::{NaiveDateTime, Timelike};

use crate::config::{AiPolicyConfig, SimulatorConfig};

use super::mode::{Mode, ModeState};

/// Instantaneous household readings fed to the controller (W, both >= 0).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LoadSample {
    pub household_w: f64,
    pub pv_w: f64,
}

impl LoadSample {
    /// Household demand left after PV, negative when PV is in surplus.
    pub fn net_load_w(&self) -> f64 {
        self.household_w - self.pv_w
    }
}

/// Maps the current mode to a requested battery power.
///
/// Pure: no clock, no randomness, no SOC limiting. Output uses the internal
/// convention (negative = charge, positive = discharge).
#[derive(Debug, Clone)]
pub struct ModeController {
    pub max_charge_w: f64,
    pub max_discharge_w: f64,
    /// Auto mode holds discharge below this SOC.
    pub auto_reserve_soc: f64,
    pub ai: AiPolicyConfig,
}

impl Default for ModeController {
    fn default() -> Self {
        Self::from_config(&SimulatorConfig::default())
    }
}

impl ModeController {
    pub fn from_config(cfg: &SimulatorConfig) -> Self {
        Self {
            max_charge_w: cfg.battery.max_charge_w,
            max_discharge_w: cfg.battery.max_discharge_w,
            auto_reserve_soc: cfg.limits.auto_reserve_soc,
            ai: cfg.ai.clone(),
        }
    }

    /// Requested battery power for this tick.
    ///
    /// Expects `state` to have had an expired passive countdown reverted already.
    pub fn target_power(
        &self,
        state: &ModeState,
        load: LoadSample,
        soc: f64,
        now: NaiveDateTime,
    ) -> f64 {
        match state.mode {
            Mode::Auto => self.auto_target(load, soc),
            Mode::Passive => state.passive.map_or(0.0, |p| f64::from(p.power_w)),
            Mode::Manual => state
                .active_schedule(now)
                .map_or(0.0, |slot| f64::from(slot.power_w)),
            Mode::Ai if state.ai.enabled => self.ai_target(load, soc, now),
            Mode::Ai => 0.0,
        }
    }

    /// Zero-export: cover the net load, soak up PV surplus.
    fn auto_target(&self, load: LoadSample, soc: f64) -> f64 {
        let net = load.net_load_w();
        if net >= 0.0 {
            if soc < self.auto_reserve_soc {
                return 0.0;
            }
            net.min(self.max_discharge_w)
        } else {
            net.max(-self.max_charge_w)
        }
    }

    fn ai_target(&self, load: LoadSample, soc: f64, now: NaiveDateTime) -> f64 {
        let ai = &self.ai;
        let hour = now.hour();

        if in_hour_window(hour, ai.night_start_hour, ai.night_end_hour) {
            return -ai.night_charge_w.min(self.max_charge_w);
        }

        let net = load.net_load_w();
        if net < 0.0 {
            return net.max(-self.max_charge_w);
        }

        let mut target = net;
        if (9..ai.evening_start_hour).contains(&hour) {
            target *= ai.day_discharge_factor;
        }
        if in_hour_window(hour, ai.evening_start_hour, ai.evening_end_hour)
            && soc < ai.evening_low_soc
        {
            target *= ai.evening_discharge_factor;
        }
        if soc < ai.reserve_soc {
            return 0.0;
        }
        target.min(self.max_discharge_w)
    }
}

/// `[start, end)` in whole hours; wraps past midnight when `start > end`.
fn in_hour_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        (start..end).contains(&hour)
    } else {
        hour >= start || hour < end
    }
}
