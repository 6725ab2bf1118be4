//! Snapshot types shared by the engine, the protocol layer and exporters.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::devices::EnergyTotals;

use super::mode::{ManualSchedule, Mode};

/// Battery power magnitude below which the device reports idle (W).
pub const IDLE_THRESHOLD_W: i32 = 50;

/// Coarse battery activity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryStatus {
    Charging,
    Discharging,
    Idle,
}

impl BatteryStatus {
    /// Classifies an internal-convention power reading (negative = charge).
    pub fn from_power(actual_w: i32) -> Self {
        if actual_w < -IDLE_THRESHOLD_W {
            Self::Charging
        } else if actual_w > IDLE_THRESHOLD_W {
            Self::Discharging
        } else {
            Self::Idle
        }
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Charging => "charging",
            Self::Discharging => "discharging",
            Self::Idle => "idle",
        })
    }
}

/// Consistent copy of the simulator state at one instant.
///
/// Every field comes from the same tick (or the same `set_mode` refresh).
/// Powers are whole watts in the internal convention: negative battery
/// power charges, positive `grid_power_w` imports.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Local wall-clock time the snapshot was taken.
    pub timestamp: NaiveDateTime,
    /// Ticks executed since construction.
    pub ticks: u64,
    /// State of charge (%), `0..=100`.
    pub soc: f64,
    pub capacity_wh: f64,
    pub mode: Mode,
    pub status: BatteryStatus,
    /// Mode controller request before jitter and limiting.
    pub target_power_w: i32,
    /// Power the pack actually delivers.
    pub actual_power_w: i32,
    /// P1 meter reading: household - PV - battery.
    pub grid_power_w: i32,
    pub household_w: i32,
    pub pv_w: i32,
    /// Seconds left on the passive countdown, `None` outside Passive mode.
    pub passive_remaining_secs: Option<u64>,
    pub ai_enabled: bool,
    pub manual_schedules: Vec<ManualSchedule>,
    pub totals: EnergyTotals,
    pub wifi_rssi: i32,
    pub battery_temp_c: f64,
    pub ct_connected: bool,
    /// The pack can accept charge (SOC below 100 %).
    pub charge_allowed: bool,
    /// The pack can deliver power (SOC above the floor).
    pub discharge_allowed: bool,
}

impl Snapshot {
    /// Battery power in the device wire convention (positive = charging).
    pub fn bat_power_wire(&self) -> i32 {
        -self.actual_power_w
    }

    /// SOC rounded to a whole percent, as the device reports it.
    pub fn soc_pct(&self) -> u8 {
        // clamped above, so the cast cannot truncate
        self.soc.round().clamp(0.0, 100.0) as u8
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={:>5} | mode={:<7} soc={:>5.1}% {:<11} | target={:>6} W  bat={:>6} W | \
             house={:>5} W  pv={:>5} W  grid={:>6} W | temp={:.1}C rssi={}",
            self.ticks,
            self.mode,
            self.soc,
            self.status,
            self.target_power_w,
            self.actual_power_w,
            self.household_w,
            self.pv_w,
            self.grid_power_w,
            self.battery_temp_c,
            self.wifi_rssi,
        )?;
        if let Some(secs) = self.passive_remaining_secs {
            write!(f, " | passive {secs}s left")?;
        }
        Ok(())
    }
}
