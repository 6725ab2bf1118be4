use serde::Serialize;

use crate::config::BatteryConfig;

/// Temperature bounds for the cell model (deg C).
const TEMP_RANGE: (f64, f64) = (15.0, 50.0);
/// Below this magnitude the pack is treated as idle for heating (W).
const IDLE_POWER_W: f64 = 100.0;
/// Heating at full rated power (deg C per second).
const HEAT_RATE: f64 = 0.3;
/// Relaxation toward ambient while idle (deg C per second).
const COOL_RATE: f64 = 0.1;

/// Lifetime energy counters (Wh). Every field only ever grows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyTotals {
    /// PV energy produced.
    pub pv_wh: f64,
    /// Energy delivered by the battery (discharge).
    pub grid_output_wh: f64,
    /// Charging energy drawn from the grid (PV-covered share excluded).
    pub grid_input_wh: f64,
    /// Household consumption.
    pub load_wh: f64,
}

/// A stationary battery pack that tracks SOC, energy totals and cell temperature.
///
/// # Power Flow Convention
/// - Positive power: discharging (supplying the household)
/// - Negative power: charging
///
/// Power limiting happens upstream; [`BatteryPack::integrate`] accepts
/// whatever it is given and keeps every field within bounds.
#[derive(Debug, Clone)]
pub struct BatteryPack {
    /// Rated capacity in watt-hours.
    pub capacity_wh: f64,
    /// State of charge in percent, always within `[0, 100]`.
    pub soc: f64,
    /// Maximum charge power in watts (positive value).
    pub max_charge_w: f64,
    /// Maximum discharge power in watts (positive value).
    pub max_discharge_w: f64,
    /// Cell temperature in deg C.
    pub temp_c: f64,
    pub ambient_temp_c: f64,
    pub totals: EnergyTotals,
}

impl BatteryPack {
    /// Creates a pack from configuration, clamping the initial SOC.
    pub fn new(cfg: &BatteryConfig) -> Self {
        let ambient = cfg.ambient_temp_c.clamp(TEMP_RANGE.0, TEMP_RANGE.1);
        Self {
            capacity_wh: cfg.capacity_wh.max(1.0),
            soc: clamp_soc(cfg.initial_soc),
            max_charge_w: cfg.max_charge_w.max(0.0),
            max_discharge_w: cfg.max_discharge_w.max(0.0),
            temp_c: ambient,
            ambient_temp_c: ambient,
            totals: EnergyTotals::default(),
        }
    }

    /// Integrates one tick of battery, household and PV power.
    ///
    /// Negative `actual_w` charges the pack. Non-finite inputs count as 0
    /// and a negative `dt_secs` as no elapsed time, so this never fails.
    ///
    /// # Arguments
    ///
    /// * `actual_w` - Battery power after limiting (W)
    /// * `household_w` - Household consumption over the tick (W)
    /// * `pv_w` - PV production over the tick (W)
    /// * `dt_secs` - Elapsed time covered by this tick
    pub fn integrate(&mut self, actual_w: f64, household_w: f64, pv_w: f64, dt_secs: f64) {
        let dt_secs = finite_or_zero(dt_secs).max(0.0);
        let actual_w = finite_or_zero(actual_w);
        let household_w = finite_or_zero(household_w).max(0.0);
        let pv_w = finite_or_zero(pv_w).max(0.0);
        let hours = dt_secs / 3600.0;

        self.soc = clamp_soc(self.soc - actual_w * hours / self.capacity_wh * 100.0);

        self.totals.pv_wh += pv_w * hours;
        self.totals.load_wh += household_w * hours;
        if actual_w > 0.0 {
            self.totals.grid_output_wh += actual_w * hours;
        } else if actual_w < 0.0 {
            let charge_w = -actual_w;
            self.totals.grid_input_wh += (charge_w - charge_w.min(pv_w)) * hours;
        }

        self.update_temperature(actual_w, dt_secs);
    }

    /// Usable energy left above empty (Wh).
    pub fn stored_wh(&self) -> f64 {
        self.capacity_wh * self.soc / 100.0
    }

    fn update_temperature(&mut self, actual_w: f64, dt_secs: f64) {
        let magnitude = actual_w.abs();
        if magnitude > IDLE_POWER_W {
            let load = if self.max_discharge_w > 0.0 {
                (magnitude / self.max_discharge_w).min(1.0)
            } else {
                1.0
            };
            self.temp_c += load * HEAT_RATE * dt_secs;
        } else {
            let step = COOL_RATE * dt_secs;
            let gap = self.ambient_temp_c - self.temp_c;
            self.temp_c += gap.clamp(-step, step);
        }
        self.temp_c = self.temp_c.clamp(TEMP_RANGE.0, TEMP_RANGE.1);
    }
}

fn clamp_soc(soc: f64) -> f64 {
    if soc.is_nan() { 0.0 } else { soc.clamp(0.0, 100.0) }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}
