use rand::{SeedableRng, rngs::StdRng};

use crate::config::PvConfig;
use crate::devices::types::{Device, DeviceContext, gaussian_noise};

/// A PV input modeled as a half-sine between sunrise and sunset.
///
/// Output follows the local wall clock with multiplicative Gaussian noise
/// for passing clouds. Always non-negative; zero at night and whenever
/// `peak_w` is zero.
#[derive(Debug, Clone)]
pub struct PvArray {
    /// Output at solar noon under clear sky (W).
    pub peak_w: f64,
    /// Sunrise as fractional hour (inclusive).
    pub sunrise_hour: f64,
    /// Sunset as fractional hour (exclusive).
    pub sunset_hour: f64,
    /// Standard deviation of the noise as a fraction of output.
    pub noise_std: f64,
    rng: StdRng,
}

impl PvArray {
    /// Creates a PV input from configuration.
    ///
    /// Negative peak or noise values are clamped to zero; the sunrise/sunset
    /// ordering is checked by [`crate::config::SimulatorConfig::validate`].
    pub fn new(cfg: &PvConfig, seed: u64) -> Self {
        Self {
            peak_w: cfg.peak_w.max(0.0),
            sunrise_hour: cfg.sunrise_hour,
            sunset_hour: cfg.sunset_hour,
            noise_std: cfg.noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.peak_w > 0.0
    }

    /// Clear-sky fraction of peak at `hour` in `[0, 1]`.
    fn daylight_frac(&self, hour: f64) -> f64 {
        if hour < self.sunrise_hour || hour >= self.sunset_hour {
            return 0.0;
        }
        let day_len = self.sunset_hour - self.sunrise_hour;
        let x = (hour - self.sunrise_hour) / day_len;
        (std::f64::consts::PI * x).sin().max(0.0)
    }
}

impl Device for PvArray {
    fn power_w(&mut self, context: &DeviceContext) -> f64 {
        if !self.is_enabled() {
            return 0.0;
        }
        let frac = self.daylight_frac(context.hour_of_day());
        if frac <= 0.0 {
            return 0.0;
        }
        let noise_mult = 1.0 + gaussian_noise(&mut self.rng, self.noise_std);
        (self.peak_w * frac * noise_mult).clamp(0.0, self.peak_w)
    }

    fn device_type(&self) -> &'static str {
        "PV"
    }
}
