//! TOML-based simulator configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Top-level simulator configuration parsed from TOML.
///
/// All fields have defaults matching a Venus E 3.0 without PV. Load from
/// TOML with [`SimulatorConfig::from_toml_file`] or use
/// [`SimulatorConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Tick timing and randomness.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Battery pack parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// SOC limiting and reserve thresholds.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// AI-mode heuristic parameters.
    #[serde(default)]
    pub ai: AiPolicyConfig,
    /// Household consumption generator.
    #[serde(default)]
    pub household: HouseholdConfig,
    /// Optional PV input.
    #[serde(default)]
    pub pv: PvConfig,
    /// WiFi signal placeholder.
    #[serde(default)]
    pub wifi: WifiConfig,
}

/// Tick timing and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Background tick interval in milliseconds (must be > 0).
    pub tick_interval_ms: u64,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            seed: 42,
        }
    }
}

/// Battery pack parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Rated energy capacity (Wh).
    pub capacity_wh: f64,
    /// Initial state of charge (0-100 %).
    pub initial_soc: f64,
    /// Maximum charging power (W, positive magnitude).
    pub max_charge_w: f64,
    /// Maximum discharging power (W, positive magnitude).
    pub max_discharge_w: f64,
    /// Random power fluctuation applied to non-zero targets (+/- %).
    pub power_jitter_pct: f64,
    /// Ambient temperature the cells cool toward (deg C).
    pub ambient_temp_c: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_wh: 5120.0,
            initial_soc: 50.0,
            max_charge_w: 3000.0,
            max_discharge_w: 3000.0,
            power_jitter_pct: 5.0,
            ambient_temp_c: 25.0,
        }
    }
}

/// SOC limiting policy and automatic-mode reserve.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Discharge is blocked at or below this SOC (%).
    pub floor_soc: f64,
    /// Discharge tapers linearly below this SOC (%).
    pub discharge_taper_soc: f64,
    /// Charge tapers linearly above this SOC (%).
    pub charge_taper_soc: f64,
    /// Auto mode does not discharge below this SOC (%).
    pub auto_reserve_soc: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            floor_soc: 5.0,
            discharge_taper_soc: 10.0,
            charge_taper_soc: 90.0,
            auto_reserve_soc: 10.0,
        }
    }
}

/// AI-mode time-of-day heuristic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiPolicyConfig {
    /// First hour of the night charging window (inclusive).
    pub night_start_hour: u32,
    /// Last hour of the night charging window (exclusive).
    pub night_end_hour: u32,
    /// Charging power during the night window (W, positive magnitude).
    pub night_charge_w: f64,
    /// Share of household load covered during the day (0.0-1.0).
    pub day_discharge_factor: f64,
    /// First hour of the evening peak (inclusive).
    pub evening_start_hour: u32,
    /// Last hour of the evening peak (exclusive).
    pub evening_end_hour: u32,
    /// Below this SOC the evening peak is only partially covered (%).
    pub evening_low_soc: f64,
    /// Share of household load covered in the evening when SOC is low.
    pub evening_discharge_factor: f64,
    /// AI mode does not discharge below this SOC (%).
    pub reserve_soc: f64,
}

impl Default for AiPolicyConfig {
    fn default() -> Self {
        Self {
            night_start_hour: 1,
            night_end_hour: 5,
            night_charge_w: 1500.0,
            day_discharge_factor: 0.7,
            evening_start_hour: 17,
            evening_end_hour: 22,
            evening_low_soc: 30.0,
            evening_discharge_factor: 0.5,
            reserve_soc: 15.0,
        }
    }
}

/// Household consumption generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HouseholdConfig {
    /// Always-on baseline (W).
    pub base_load_w: f64,
    /// Reported consumption never drops below this (W).
    pub min_load_w: f64,
    /// Add a random time-of-day component (morning/evening peaks).
    pub time_of_day_variation: bool,
    /// Start random cooking and appliance events.
    pub random_events: bool,
    /// Add second-by-second random walk fluctuation.
    pub micro_fluctuation: bool,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            base_load_w: 200.0,
            min_load_w: 50.0,
            time_of_day_variation: true,
            random_events: true,
            micro_fluctuation: true,
        }
    }
}

/// PV input. A zero peak disables PV entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvConfig {
    /// Peak PV power (W).
    pub peak_w: f64,
    /// Sunrise as fractional hour of day.
    pub sunrise_hour: f64,
    /// Sunset as fractional hour of day.
    pub sunset_hour: f64,
    /// Relative Gaussian noise on PV output.
    pub noise_std: f64,
}

impl Default for PvConfig {
    fn default() -> Self {
        Self {
            peak_w: 0.0,
            sunrise_hour: 7.0,
            sunset_hour: 19.0,
            noise_std: 0.05,
        }
    }
}

/// WiFi signal placeholder.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WifiConfig {
    /// Typical RSSI (dBm).
    pub base_rssi: i32,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self { base_rssi: -55 }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.capacity_wh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl SimulatorConfig {
    /// Returns the baseline device: Venus E, 5.12 kWh, no PV.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns a Venus D style device with a PV input.
    pub fn venus_d() -> Self {
        Self {
            battery: BatteryConfig {
                max_charge_w: 2500.0,
                max_discharge_w: 2500.0,
                ..BatteryConfig::default()
            },
            pv: PvConfig {
                peak_w: 2200.0,
                ..PvConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns a fully deterministic device: no jitter, flat household load.
    pub fn quiet() -> Self {
        Self {
            battery: BatteryConfig {
                power_jitter_pct: 0.0,
                ..BatteryConfig::default()
            },
            household: HouseholdConfig {
                time_of_day_variation: false,
                random_events: false,
                micro_fluctuation: false,
                ..HouseholdConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "venus_d", "quiet"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "venus_d" => Ok(Self::venus_d()),
            "quiet" => Ok(Self::quiet()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.simulation.tick_interval_ms == 0 {
            errors.push(ConfigError::new("simulation.tick_interval_ms", "must be > 0"));
        }

        let bat = &self.battery;
        if !(bat.capacity_wh > 0.0) {
            errors.push(ConfigError::new("battery.capacity_wh", "must be > 0"));
        }
        if !(0.0..=100.0).contains(&bat.initial_soc) {
            errors.push(ConfigError::new("battery.initial_soc", "must be in [0, 100]"));
        }
        if !(bat.max_charge_w >= 0.0) {
            errors.push(ConfigError::new("battery.max_charge_w", "must be >= 0"));
        }
        if !(bat.max_discharge_w >= 0.0) {
            errors.push(ConfigError::new("battery.max_discharge_w", "must be >= 0"));
        }
        if !(0.0..=50.0).contains(&bat.power_jitter_pct) {
            errors.push(ConfigError::new("battery.power_jitter_pct", "must be in [0, 50]"));
        }

        let lim = &self.limits;
        if !(0.0 <= lim.floor_soc && lim.floor_soc < lim.discharge_taper_soc) {
            errors.push(ConfigError::new(
                "limits.floor_soc",
                "must be >= 0 and < limits.discharge_taper_soc",
            ));
        }
        if !(lim.discharge_taper_soc < lim.charge_taper_soc && lim.charge_taper_soc < 100.0) {
            errors.push(ConfigError::new(
                "limits.charge_taper_soc",
                "must be > limits.discharge_taper_soc and < 100",
            ));
        }
        if !(0.0..=100.0).contains(&lim.auto_reserve_soc) {
            errors.push(ConfigError::new("limits.auto_reserve_soc", "must be in [0, 100]"));
        }

        let ai = &self.ai;
        if ai.night_start_hour > 23 || ai.night_end_hour > 24 {
            errors.push(ConfigError::new("ai.night_start_hour", "hours must be within a day"));
        }
        if ai.evening_start_hour >= ai.evening_end_hour || ai.evening_end_hour > 24 {
            errors.push(ConfigError::new(
                "ai.evening_start_hour",
                "must be < ai.evening_end_hour <= 24",
            ));
        }
        for (field, factor) in [
            ("ai.day_discharge_factor", ai.day_discharge_factor),
            ("ai.evening_discharge_factor", ai.evening_discharge_factor),
        ] {
            if !(0.0..=1.0).contains(&factor) {
                errors.push(ConfigError::new(field, "must be in [0.0, 1.0]"));
            }
        }

        let house = &self.household;
        if !(house.base_load_w >= 0.0) {
            errors.push(ConfigError::new("household.base_load_w", "must be >= 0"));
        }
        if !(house.min_load_w >= 0.0) {
            errors.push(ConfigError::new("household.min_load_w", "must be >= 0"));
        }

        let pv = &self.pv;
        if !(pv.peak_w >= 0.0) {
            errors.push(ConfigError::new("pv.peak_w", "must be >= 0"));
        }
        if !(0.0 <= pv.sunrise_hour && pv.sunrise_hour < pv.sunset_hour && pv.sunset_hour <= 24.0)
        {
            errors.push(ConfigError::new(
                "pv.sunrise_hour",
                "must satisfy 0 <= sunrise_hour < sunset_hour <= 24",
            ));
        }

        if !(-95..=-25).contains(&self.wifi.base_rssi) {
            errors.push(ConfigError::new("wifi.base_rssi", "must be in [-95, -25]"));
        }

        errors
    }
}
