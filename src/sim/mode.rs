//! Operating modes, their typed configuration, and mode-specific state.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ConfigError;

/// Number of manual schedule slots the hardware exposes (`time_num` 0..=9).
pub const MAX_SCHEDULE_SLOTS: u8 = 10;
/// Largest accepted power magnitude for any mode (W).
pub const MAX_POWER_W: i32 = 5000;
/// Longest accepted passive countdown (s).
pub const MAX_PASSIVE_SECS: i64 = 86_400;

/// The four mutually exclusive control modes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Zero-export self-consumption: discharge to cover household load.
    #[default]
    Auto,
    /// Time-of-day heuristic.
    #[serde(rename = "AI")]
    Ai,
    /// Weekly time-windowed schedules.
    Manual,
    /// Fixed power for a bounded countdown.
    Passive,
}

impl Mode {
    /// Wire name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Ai => "AI",
            Self::Manual => "Manual",
            Self::Passive => "Passive",
        }
    }

    /// Strict parse of a wire mode name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Auto" => Some(Self::Auto),
            "AI" => Some(Self::Ai),
            "Manual" => Some(Self::Manual),
            "Passive" => Some(Self::Passive),
            _ => None,
        }
    }

    /// Lenient parse used at the request boundary.
    ///
    /// Unknown names fall back to [`Mode::Auto`], mirroring what the device
    /// does with mode strings it does not recognise.
    pub fn from_wire(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!(mode = name, "unknown mode, falling back to Auto");
            Self::Auto
        })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Seven-bit day mask, bit 0 = Monday ... bit 6 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WeekMask(u8);

impl WeekMask {
    /// Every day of the week.
    pub const ALL: Self = Self(0x7f);

    /// Builds a mask, rejecting bits above Sunday.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `bits > 127`.
    pub fn new(bits: u8) -> Result<Self, ConfigError> {
        if bits > Self::ALL.0 {
            return Err(ConfigError::new(
                "week_set",
                format!("must be between 0 and 127 (got {bits})"),
            ));
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }
}

/// `ES.SetMode` passive request: hold `power_w` for `cd_time_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassiveConfig {
    /// Requested power, negative = charge.
    pub power_w: i32,
    /// Countdown length; must be positive.
    pub cd_time_secs: i64,
}

/// One manual schedule slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManualSchedule {
    pub time_num: u8,
    #[serde(serialize_with = "serialize_hhmm")]
    pub start_time: NaiveTime,
    #[serde(serialize_with = "serialize_hhmm")]
    pub end_time: NaiveTime,
    pub week_set: WeekMask,
    /// Requested power, negative = charge.
    pub power_w: i32,
    pub enabled: bool,
}

impl ManualSchedule {
    /// Whether this slot drives the battery at `now`.
    ///
    /// Windows are compared at minute resolution and are inclusive on both ends.
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        if !self.enabled || !self.week_set.contains(now.weekday()) {
            return false;
        }
        let minute = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(NaiveTime::MIN);
        self.start_time <= minute && minute <= self.end_time
    }
}

fn serialize_hhmm<S: serde::Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&t.format("%H:%M"))
}

/// Parses an `"HH:MM"` wall-clock time.
///
/// # Errors
///
/// Returns a `ConfigError` naming `field` if the text is not a valid time.
pub fn parse_hhmm(field: &str, text: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(text, "%H:%M").map_err(|_| {
        ConfigError::new(field, format!("must be in HH:MM format (got '{text}')"))
    })
}

/// AI-mode settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AiConfig {
    pub enabled: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Typed `set_mode` payload: one variant per mode carrying exactly that mode's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeConfig {
    Auto,
    Ai(AiConfig),
    Manual(ManualSchedule),
    Passive(PassiveConfig),
}

impl ModeConfig {
    /// The mode this payload switches to.
    pub fn mode(&self) -> Mode {
        match self {
            Self::Auto => Mode::Auto,
            Self::Ai(_) => Mode::Ai,
            Self::Manual(_) => Mode::Manual,
            Self::Passive(_) => Mode::Passive,
        }
    }

    /// Checks value ranges. Shape is already guaranteed by the type.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Auto | Self::Ai(_) => Ok(()),
            Self::Passive(cfg) => {
                check_power("passive_cfg.power", cfg.power_w)?;
                if cfg.cd_time_secs <= 0 || cfg.cd_time_secs > MAX_PASSIVE_SECS {
                    return Err(ConfigError::new(
                        "passive_cfg.cd_time",
                        format!(
                            "must be between 1 and {MAX_PASSIVE_SECS} seconds (got {})",
                            cfg.cd_time_secs
                        ),
                    ));
                }
                Ok(())
            }
            Self::Manual(slot) => {
                if slot.time_num >= MAX_SCHEDULE_SLOTS {
                    return Err(ConfigError::new(
                        "manual_cfg.time_num",
                        format!(
                            "must be between 0 and {} (got {})",
                            MAX_SCHEDULE_SLOTS - 1,
                            slot.time_num
                        ),
                    ));
                }
                check_power("manual_cfg.power", slot.power_w)?;
                if slot.enabled && slot.end_time <= slot.start_time {
                    return Err(ConfigError::new(
                        "manual_cfg.end_time",
                        "must be after start_time for an enabled slot",
                    ));
                }
                Ok(())
            }
        }
    }
}

fn check_power(field: &str, power_w: i32) -> Result<(), ConfigError> {
    if power_w.unsigned_abs() > MAX_POWER_W.unsigned_abs() {
        return Err(ConfigError::new(
            field,
            format!("must be between -{MAX_POWER_W} and {MAX_POWER_W} (got {power_w})"),
        ));
    }
    Ok(())
}

/// Active passive countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassiveState {
    pub power_w: i32,
    pub end_time: NaiveDateTime,
}

impl PassiveState {
    /// Whole seconds left, never negative.
    pub fn remaining_secs(&self, now: NaiveDateTime) -> u64 {
        u64::try_from((self.end_time - now).num_seconds()).unwrap_or(0)
    }
}

/// Mode-specific state owned by the simulator.
///
/// Invariant: `passive` is `Some` only while `mode == Mode::Passive`.
#[derive(Debug, Clone, Default)]
pub struct ModeState {
    pub mode: Mode,
    /// Keyed by `time_num`; iteration order gives lowest slot first.
    pub manual_schedules: BTreeMap<u8, ManualSchedule>,
    pub passive: Option<PassiveState>,
    pub ai: AiConfig,
}

impl ModeState {
    /// Replaces mode-specific state with `config`. Call only after `config.validate()`.
    pub fn apply(&mut self, config: ModeConfig, now: NaiveDateTime) {
        self.mode = config.mode();
        self.passive = None;
        match config {
            ModeConfig::Auto => {}
            ModeConfig::Ai(ai) => self.ai = ai,
            ModeConfig::Manual(slot) => {
                self.manual_schedules.insert(slot.time_num, slot);
            }
            ModeConfig::Passive(cfg) => {
                self.passive = Some(PassiveState {
                    power_w: cfg.power_w,
                    end_time: now + TimeDelta::seconds(cfg.cd_time_secs),
                });
            }
        }
    }

    /// Reverts an expired passive countdown to Auto. Returns `true` if it did.
    pub fn expire_passive(&mut self, now: NaiveDateTime) -> bool {
        if self.mode != Mode::Passive {
            return false;
        }
        let expired = self.passive.is_none_or(|p| now >= p.end_time);
        if expired {
            self.mode = Mode::Auto;
            self.passive = None;
        }
        expired
    }

    /// The schedule driving Manual mode at `now`, lowest `time_num` first.
    pub fn active_schedule(&self, now: NaiveDateTime) -> Option<&ManualSchedule> {
        self.manual_schedules
            .values()
            .find(|slot| slot.is_active_at(now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    // 2024-06-03 is a Monday.
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .expect("valid date")
    }

    fn slot(time_num: u8, start: &str, end: &str, power_w: i32) -> ManualSchedule {
        ManualSchedule {
            time_num,
            start_time: parse_hhmm("start_time", start).expect("valid start"),
            end_time: parse_hhmm("end_time", end).expect("valid end"),
            week_set: WeekMask::ALL,
            power_w,
            enabled: true,
        }
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [Mode::Auto, Mode::Ai, Mode::Manual, Mode::Passive] {
            assert_eq!(Mode::parse(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn unknown_mode_falls_back_to_auto() {
        assert_eq!(Mode::parse("Turbo"), None);
        assert_eq!(Mode::from_wire("Turbo"), Mode::Auto);
        assert_eq!(Mode::from_wire("Manual"), Mode::Manual);
    }

    #[test]
    fn week_mask_bits_map_monday_first() {
        let weekdays = WeekMask::new(0b001_1111).expect("valid mask");
        assert!(weekdays.contains(Weekday::Mon));
        assert!(weekdays.contains(Weekday::Fri));
        assert!(!weekdays.contains(Weekday::Sat));
        assert!(!weekdays.contains(Weekday::Sun));
        assert!(WeekMask::new(128).is_err());
    }

    #[test]
    fn passive_rejects_non_positive_countdown() {
        let zero = ModeConfig::Passive(PassiveConfig {
            power_w: -1000,
            cd_time_secs: 0,
        });
        let negative = ModeConfig::Passive(PassiveConfig {
            power_w: -1000,
            cd_time_secs: -30,
        });
        assert_eq!(zero.validate().map_err(|e| e.field), Err("passive_cfg.cd_time".to_string()));
        assert!(negative.validate().is_err());
    }

    #[test]
    fn manual_rejects_slot_out_of_range() {
        let cfg = ModeConfig::Manual(slot(10, "00:00", "23:59", -1000));
        let err = cfg.validate().expect_err("slot 10 is out of range");
        assert_eq!(err.field, "manual_cfg.time_num");
    }

    #[test]
    fn manual_rejects_excess_power() {
        let cfg = ModeConfig::Manual(slot(0, "00:00", "23:59", -6000));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn disabled_slot_may_have_empty_window() {
        let mut s = slot(3, "10:00", "10:00", 0);
        s.enabled = false;
        assert!(ModeConfig::Manual(s).validate().is_ok());
        s.enabled = true;
        assert!(ModeConfig::Manual(s).validate().is_err());
    }

    #[test]
    fn bad_time_text_is_rejected() {
        assert!(parse_hhmm("start_time", "24:00").is_err());
        assert!(parse_hhmm("start_time", "7pm").is_err());
        assert!(parse_hhmm("start_time", "07:30").is_ok());
    }

    #[test]
    fn schedule_window_is_inclusive_at_minute_resolution() {
        let s = slot(0, "08:00", "09:30", -1000);
        assert!(!s.is_active_at(monday_at(7, 59)));
        assert!(s.is_active_at(monday_at(8, 0)));
        assert!(s.is_active_at(monday_at(9, 30)));
        assert!(!s.is_active_at(monday_at(9, 31)));
    }

    #[test]
    fn schedule_respects_week_mask() {
        let mut s = slot(0, "00:00", "23:59", -1000);
        s.week_set = WeekMask::new(0).expect("valid mask");
        assert!(!s.is_active_at(monday_at(12, 0)));
        s.week_set = WeekMask::new(0b000_0001).expect("valid mask");
        assert!(s.is_active_at(monday_at(12, 0)));
    }

    #[test]
    fn manual_upsert_keeps_one_entry_per_slot() {
        let now = monday_at(12, 0);
        let mut state = ModeState::default();
        state.apply(ModeConfig::Manual(slot(0, "00:00", "23:59", -1000)), now);
        state.apply(ModeConfig::Manual(slot(1, "00:00", "23:59", -2000)), now);
        assert_eq!(state.manual_schedules.len(), 2);

        state.apply(ModeConfig::Manual(slot(0, "00:00", "23:59", -1500)), now);
        assert_eq!(state.manual_schedules.len(), 2);
        assert_eq!(state.manual_schedules[&0].power_w, -1500);
    }

    #[test]
    fn lowest_slot_wins_when_several_match() {
        let now = monday_at(12, 0);
        let mut state = ModeState::default();
        state.apply(ModeConfig::Manual(slot(4, "00:00", "23:59", -2000)), now);
        state.apply(ModeConfig::Manual(slot(2, "11:00", "13:00", -1000)), now);
        assert_eq!(state.active_schedule(now).map(|s| s.time_num), Some(2));
        assert_eq!(
            state.active_schedule(monday_at(14, 0)).map(|s| s.time_num),
            Some(4)
        );
    }

    #[test]
    fn passive_expires_into_auto() {
        let now = monday_at(12, 0);
        let mut state = ModeState::default();
        state.apply(
            ModeConfig::Passive(PassiveConfig {
                power_w: -1400,
                cd_time_secs: 60,
            }),
            now,
        );
        assert_eq!(state.mode, Mode::Passive);
        assert_eq!(state.passive.map(|p| p.remaining_secs(now)), Some(60));

        assert!(!state.expire_passive(now + TimeDelta::seconds(59)));
        assert!(state.expire_passive(now + TimeDelta::seconds(60)));
        assert_eq!(state.mode, Mode::Auto);
        assert!(state.passive.is_none());
    }

    #[test]
    fn leaving_passive_clears_countdown() {
        let now = monday_at(12, 0);
        let mut state = ModeState::default();
        state.apply(
            ModeConfig::Passive(PassiveConfig {
                power_w: 1000,
                cd_time_secs: 3600,
            }),
            now,
        );
        state.apply(ModeConfig::Auto, now);
        assert_eq!(state.mode, Mode::Auto);
        assert!(state.passive.is_none());
    }
}
