//! Translation between simulator snapshots and the device's JSON-RPC documents.
//!
//! The request dispatcher itself lives elsewhere; this module only builds the
//! per-method `result` documents from a [`Snapshot`] and turns an
//! `ES.SetMode` config object into a typed [`ModeConfig`].
//!
//! Sign conventions on the wire:
//! - `bat_power` is positive while charging, the inverse of the simulator.
//! - `ES.SetMode` powers (passive and manual) are negative for charging,
//!   the same as the simulator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConfigError;
use crate::sim::mode::{
    AiConfig, ManualSchedule, Mode, ModeConfig, PassiveConfig, WeekMask, parse_hhmm,
};
use crate::sim::types::Snapshot;

/// Nominal PV string voltage used to derive a plausible current (V).
const PV_NOMINAL_VOLTAGE: f64 = 48.0;
/// Share of the grid reading attributed to each of phases A and B.
const PHASE_SHARE: f64 = 0.33;

/// Converts internal battery power (negative = charge) to wire `bat_power`.
pub fn bat_power_to_wire(actual_power_w: i32) -> i32 {
    actual_power_w.saturating_neg()
}

/// `ES.GetStatus` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EsStatus {
    pub id: u8,
    pub bat_soc: u8,
    pub bat_cap: u32,
    pub pv_power: i32,
    pub ongrid_power: i32,
    pub offgrid_power: i32,
    pub bat_power: i32,
    pub total_pv_energy: u64,
    pub total_grid_output_energy: u64,
    pub total_grid_input_energy: u64,
    pub total_load_energy: u64,
}

impl From<&Snapshot> for EsStatus {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: 0,
            bat_soc: s.soc_pct(),
            bat_cap: whole_wh(s.capacity_wh) as u32,
            pv_power: s.pv_w,
            ongrid_power: s.grid_power_w,
            offgrid_power: 0,
            bat_power: bat_power_to_wire(s.actual_power_w),
            total_pv_energy: whole_wh(s.totals.pv_wh),
            total_grid_output_energy: whole_wh(s.totals.grid_output_wh),
            total_grid_input_energy: whole_wh(s.totals.grid_input_wh),
            total_load_energy: whole_wh(s.totals.load_wh),
        }
    }
}

/// `ES.GetMode` result. The device does not echo mode-specific settings here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EsMode {
    pub id: u8,
    pub mode: Mode,
    pub ongrid_power: i32,
    pub offgrid_power: i32,
    pub bat_soc: u8,
}

impl From<&Snapshot> for EsMode {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: 0,
            mode: s.mode,
            ongrid_power: s.grid_power_w,
            offgrid_power: 0,
            bat_soc: s.soc_pct(),
        }
    }
}

/// `EM.GetStatus` result: CT clamp reading split over three phases.
///
/// Phases A and B each carry a fixed share and C takes the remainder, so
/// the phases always sum to `total_power`. A disconnected CT reads zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmStatus {
    pub id: u8,
    pub ct_state: u8,
    pub a_power: i32,
    pub b_power: i32,
    pub c_power: i32,
    pub total_power: i32,
}

impl From<&Snapshot> for EmStatus {
    fn from(s: &Snapshot) -> Self {
        if !s.ct_connected {
            return Self {
                id: 0,
                ct_state: 0,
                a_power: 0,
                b_power: 0,
                c_power: 0,
                total_power: 0,
            };
        }
        let total = s.grid_power_w;
        let a = (f64::from(total) * PHASE_SHARE).round() as i32;
        let b = a;
        Self {
            id: 0,
            ct_state: 1,
            a_power: a,
            b_power: b,
            c_power: total - a - b,
            total_power: total,
        }
    }
}

/// `Bat.GetStatus` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatStatus {
    pub id: u8,
    pub soc: u8,
    pub charg_flag: bool,
    pub dischrg_flag: bool,
    /// Cell temperature, one decimal (deg C).
    pub bat_temp: f64,
    /// Energy currently stored (Wh).
    pub bat_capacity: u32,
    pub rated_capacity: u32,
}

impl From<&Snapshot> for BatStatus {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: 0,
            soc: s.soc_pct(),
            charg_flag: s.charge_allowed,
            dischrg_flag: s.discharge_allowed,
            bat_temp: (s.battery_temp_c * 10.0).round() / 10.0,
            bat_capacity: whole_wh(s.capacity_wh * s.soc / 100.0) as u32,
            rated_capacity: whole_wh(s.capacity_wh) as u32,
        }
    }
}

/// `PV.GetStatus` result. All zeros when no PV is configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PvStatus {
    pub id: u8,
    pub pv_power: i32,
    pub pv_voltage: f64,
    pub pv_current: f64,
    pub pv_state: u8,
}

impl From<&Snapshot> for PvStatus {
    fn from(s: &Snapshot) -> Self {
        if s.pv_w <= 0 {
            return Self {
                id: 0,
                pv_power: 0,
                pv_voltage: 0.0,
                pv_current: 0.0,
                pv_state: 0,
            };
        }
        let current = f64::from(s.pv_w) / PV_NOMINAL_VOLTAGE;
        Self {
            id: 0,
            pv_power: s.pv_w,
            pv_voltage: PV_NOMINAL_VOLTAGE,
            pv_current: (current * 10.0).round() / 10.0,
            pv_state: 1,
        }
    }
}

/// `Wifi.GetStatus` result (signal strength only).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WifiStatus {
    pub id: u8,
    pub rssi: i32,
}

impl From<&Snapshot> for WifiStatus {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: 0,
            rssi: s.wifi_rssi,
        }
    }
}

/// `ES.SetMode` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetModeResult {
    pub id: u8,
    pub set_result: bool,
}

impl SetModeResult {
    pub fn ok() -> Self {
        Self {
            id: 0,
            set_result: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WirePassiveCfg {
    power: i32,
    cd_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireManualCfg {
    time_num: u8,
    start_time: String,
    end_time: String,
    week_set: u8,
    power: i32,
    enable: u8,
}

// Firmware revisions add extra AI settings; only `enable` matters here.
#[derive(Debug, Deserialize)]
struct WireAiCfg {
    #[serde(default = "enabled_flag")]
    enable: u8,
}

fn enabled_flag() -> u8 {
    1
}

/// Parses `ES.SetMode` params (`{"id": 0, "config": {...}}`).
///
/// # Errors
///
/// Returns a `ConfigError` if `config` is missing or invalid.
pub fn parse_set_mode_params(params: &Value) -> Result<ModeConfig, ConfigError> {
    let config = params
        .get("config")
        .ok_or_else(|| ConfigError::new("config", "is required"))?;
    parse_set_mode(config)
}

/// Parses an `ES.SetMode` config object into a validated [`ModeConfig`].
///
/// The mode-specific object must match its mode's shape exactly (AI
/// settings excepted). Unknown mode names fall back to Auto.
///
/// # Errors
///
/// Returns a `ConfigError` naming the missing, mistyped or out-of-range field.
pub fn parse_set_mode(config: &Value) -> Result<ModeConfig, ConfigError> {
    let obj = config
        .as_object()
        .ok_or_else(|| ConfigError::new("config", "must be an object"))?;
    let name = obj
        .get("mode")
        .ok_or_else(|| ConfigError::new("mode", "is required"))?
        .as_str()
        .ok_or_else(|| ConfigError::new("mode", "must be a string"))?;

    let mode_config = match Mode::from_wire(name) {
        Mode::Auto => ModeConfig::Auto,
        Mode::Passive => {
            let cfg: WirePassiveCfg = section(config, "passive_cfg")?;
            ModeConfig::Passive(PassiveConfig {
                power_w: cfg.power,
                cd_time_secs: cfg.cd_time,
            })
        }
        Mode::Manual => {
            let cfg: WireManualCfg = section(config, "manual_cfg")?;
            ModeConfig::Manual(manual_schedule(cfg)?)
        }
        Mode::Ai => match obj.get("ai_cfg") {
            None => ModeConfig::Ai(AiConfig::default()),
            Some(_) => {
                let cfg: WireAiCfg = section(config, "ai_cfg")?;
                ModeConfig::Ai(AiConfig {
                    enabled: flag("ai_cfg.enable", cfg.enable)?,
                })
            }
        },
    };

    mode_config.validate()?;
    Ok(mode_config)
}

fn section<T: for<'de> Deserialize<'de>>(config: &Value, field: &str) -> Result<T, ConfigError> {
    let raw = config
        .get(field)
        .ok_or_else(|| ConfigError::new(field, "is required for this mode"))?;
    T::deserialize(raw).map_err(|e| ConfigError::new(field, e.to_string()))
}

fn manual_schedule(cfg: WireManualCfg) -> Result<ManualSchedule, ConfigError> {
    Ok(ManualSchedule {
        time_num: cfg.time_num,
        start_time: parse_hhmm("manual_cfg.start_time", &cfg.start_time)?,
        end_time: parse_hhmm("manual_cfg.end_time", &cfg.end_time)?,
        week_set: WeekMask::new(cfg.week_set)
            .map_err(|e| ConfigError::new("manual_cfg.week_set", e.message))?,
        power_w: cfg.power,
        enabled: flag("manual_cfg.enable", cfg.enable)?,
    })
}

fn flag(field: &str, value: u8) -> Result<bool, ConfigError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ConfigError::new(field, format!("must be 0 or 1 (got {other})"))),
    }
}

fn whole_wh(wh: f64) -> u64 {
    // saturating cast; energy counters are never negative
    wh.max(0.0).round() as u64
}
