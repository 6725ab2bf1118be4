//! Wall-clock sources for the simulator.
//!
//! Mode logic (passive countdown, manual schedules, time-of-day load) reads
//! the local wall clock through [`TimeSource`] so tests can pin it.

use chrono::{Local, NaiveDateTime, TimeDelta};
use parking_lot::Mutex;

/// Provides the current local date and time.
pub trait TimeSource: Send + Sync {
    /// Returns the current local time.
    fn now(&self) -> NaiveDateTime;
}

/// The host's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, TimeDelta};
/// use venus_sim::sim::clock::{ManualClock, TimeSource};
///
/// let start = NaiveDate::from_ymd_opt(2024, 6, 3)
///     .and_then(|d| d.and_hms_opt(12, 0, 0))
///     .unwrap();
/// let clock = ManualClock::new(start);
/// clock.advance(TimeDelta::seconds(90));
/// assert_eq!(clock.now(), start + TimeDelta::seconds(90));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock() = at;
    }

    /// Moves the clock forward (or backward for negative deltas).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}
