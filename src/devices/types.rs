//! Common types and traits for simulated household devices.

use chrono::{NaiveDateTime, Timelike};
use rand::{Rng, rngs::StdRng};

/// Contextual information passed to devices on every sample.
///
/// # Fields
/// * `now` - Local wall-clock time of the sample
/// * `dt_secs` - Seconds since the previous sample (0 for an immediate refresh)
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext {
    pub now: NaiveDateTime,
    pub dt_secs: f64,
}

impl DeviceContext {
    pub fn new(now: NaiveDateTime, dt_secs: f64) -> Self {
        Self {
            now,
            dt_secs: dt_secs.max(0.0),
        }
    }

    /// Fractional hour of day in `[0, 24)`.
    pub fn hour_of_day(&self) -> f64 {
        f64::from(self.now.num_seconds_from_midnight()) / 3600.0
    }
}

/// A device that produces or consumes power alongside the battery.
pub trait Device {
    /// Returns the device's power magnitude in watts for this sample.
    ///
    /// Loads report consumption and generators report production; both are
    /// non-negative. The caller decides how they enter the power balance.
    fn power_w(&mut self, context: &DeviceContext) -> f64;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Gaussian noise via the Box-Muller transform.
///
/// Returns 0 when `std_dev` is not positive.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if !(std_dev > 0.0) {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn zero_std_gives_no_noise() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
        assert_eq!(gaussian_noise(&mut rng, -1.0), 0.0);
    }

    #[test]
    fn noise_is_roughly_centered() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 10_000;
        let mean = (0..n).map(|_| gaussian_noise(&mut rng, 1.0)).sum::<f64>() / f64::from(n);
        assert!(mean.abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn hour_of_day_is_fractional() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|d| d.and_hms_opt(13, 30, 0))
            .expect("valid date");
        let ctx = DeviceContext::new(now, -3.0);
        assert_eq!(ctx.hour_of_day(), 13.5);
        assert_eq!(ctx.dt_secs, 0.0);
    }
}
