use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::WifiConfig;

/// Reported RSSI is clamped to this range (dBm).
pub const RSSI_RANGE: (i32, i32) = (-95, -25);

/// WiFi signal strength placeholder reported in device status.
///
/// Slowly drifts around `base_rssi`, adds per-sample noise and occasionally
/// drops by 10-20 dB for a short interference burst.
#[derive(Debug, Clone)]
pub struct WifiSignal {
    pub base_rssi: i32,
    current: i32,
    drift_target: i32,
    /// Seconds until a new drift target is drawn.
    retarget_in_secs: f64,
    interference_db: i32,
    interference_secs: f64,
    rng: StdRng,
}

impl WifiSignal {
    pub fn new(cfg: &WifiConfig, seed: u64) -> Self {
        Self {
            base_rssi: cfg.base_rssi,
            current: cfg.base_rssi,
            drift_target: cfg.base_rssi,
            retarget_in_secs: 0.0,
            interference_db: 0,
            interference_secs: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Advances by `dt_secs` and returns the RSSI to report (dBm).
    pub fn sample(&mut self, dt_secs: f64) -> i32 {
        self.retarget_in_secs -= dt_secs;
        self.interference_secs = (self.interference_secs - dt_secs).max(0.0);

        if self.retarget_in_secs <= 0.0 {
            self.retarget_in_secs = self.rng.random_range(30.0..=60.0);
            let drift = self.rng.random_range(-5..=5);
            self.drift_target = (self.base_rssi + drift).clamp(-90, -30);

            if self.rng.random_bool(0.05) {
                self.interference_db = self.rng.random_range(10..=20);
                self.interference_secs = self.rng.random_range(5.0..=30.0);
            }
        }

        // one dB per sample toward the drift target
        self.current += (self.drift_target - self.current).signum();

        let mut rssi = self.current + self.rng.random_range(-2..=2);
        if self.interference_secs > 0.0 {
            rssi -= self.interference_db;
        }
        rssi.clamp(RSSI_RANGE.0, RSSI_RANGE.1)
    }
}
