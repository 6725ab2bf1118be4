use crate::config::LimitsConfig;

/// SOC-dependent power limiting.
///
/// Works in the simulator's internal convention: negative = charge,
/// positive = discharge. Discharge is blocked at or below `floor_soc` and
/// tapers linearly toward 0 % SOC below `discharge_taper_soc`; charge is
/// blocked at 100 % and tapers linearly toward 100 % above
/// `charge_taper_soc`. Both tapers are 1.0 at their outer edge, so the
/// allowed power is continuous where a band begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocLimiter {
    pub floor_soc: f64,
    pub discharge_taper_soc: f64,
    pub charge_taper_soc: f64,
}

impl Default for SocLimiter {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default())
    }
}

impl SocLimiter {
    pub fn from_config(cfg: &LimitsConfig) -> Self {
        Self {
            floor_soc: cfg.floor_soc,
            discharge_taper_soc: cfg.discharge_taper_soc,
            charge_taper_soc: cfg.charge_taper_soc,
        }
    }

    /// Returns the power the pack may actually deliver at `soc`.
    ///
    /// Total: out-of-range SOC is clamped to `[0, 100]` and a NaN request yields 0.
    pub fn apply(&self, requested_w: f64, soc: f64) -> f64 {
        if requested_w.is_nan() {
            return 0.0;
        }
        let soc = if soc.is_nan() { 0.0 } else { soc.clamp(0.0, 100.0) };

        if requested_w > 0.0 {
            if soc <= self.floor_soc {
                return 0.0;
            }
            if soc < self.discharge_taper_soc {
                return requested_w * soc / self.discharge_taper_soc;
            }
        } else if requested_w < 0.0 {
            if soc >= 100.0 {
                return 0.0;
            }
            if soc > self.charge_taper_soc {
                return requested_w * (100.0 - soc) / (100.0 - self.charge_taper_soc);
            }
        }
        requested_w
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::SocLimiter;

    #[test]
    fn no_discharge_below_floor() {
        let limiter = SocLimiter::default();
        assert_eq!(limiter.apply(1000.0, 3.0), 0.0);
        assert_eq!(limiter.apply(1000.0, 5.0), 0.0);
    }

    #[test]
    fn charging_allowed_when_empty() {
        let limiter = SocLimiter::default();
        assert_eq!(limiter.apply(-1000.0, 0.0), -1000.0);
    }

    #[test]
    fn no_charge_when_full() {
        let limiter = SocLimiter::default();
        assert_eq!(limiter.apply(-1000.0, 100.0), 0.0);
        assert_eq!(limiter.apply(1000.0, 100.0), 1000.0);
    }

    #[test]
    fn charge_tapers_near_full() {
        let limiter = SocLimiter::default();
        let limited = limiter.apply(-2000.0, 95.0);
        assert!((-1100.0..=-900.0).contains(&limited), "got {limited}");
    }

    #[test]
    fn discharge_tapers_near_empty() {
        let limiter = SocLimiter::default();
        let limited = limiter.apply(1000.0, 7.0);
        assert!((650.0..=750.0).contains(&limited), "got {limited}");
    }

    #[test]
    fn mid_range_is_untouched() {
        let limiter = SocLimiter::default();
        assert_eq!(limiter.apply(2500.0, 50.0), 2500.0);
        assert_eq!(limiter.apply(-2500.0, 50.0), -2500.0);
        assert_eq!(limiter.apply(0.0, 50.0), 0.0);
    }

    #[test]
    fn continuous_at_band_edges() {
        let limiter = SocLimiter::default();
        let eps = 1e-9;
        assert!((limiter.apply(-2000.0, 90.0 + eps) - -2000.0).abs() < 1e-3);
        assert!((limiter.apply(1000.0, 10.0 - eps) - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn out_of_domain_inputs_are_clamped() {
        let limiter = SocLimiter::default();
        assert_eq!(limiter.apply(-1000.0, 140.0), 0.0);
        assert_eq!(limiter.apply(1000.0, -20.0), 0.0);
        assert_eq!(limiter.apply(f64::NAN, 50.0), 0.0);
    }

    proptest! {
        #[test]
        fn discharge_is_zero_below_floor(p in 1.0f64..5000.0, soc in 0.0f64..5.0) {
            prop_assert_eq!(SocLimiter::default().apply(p, soc), 0.0);
        }

        #[test]
        fn charge_is_zero_at_full(p in -5000.0f64..-1.0) {
            prop_assert_eq!(SocLimiter::default().apply(p, 100.0), 0.0);
        }

        #[test]
        fn never_amplifies_and_keeps_sign(p in -5000.0f64..5000.0, soc in 0.0f64..=100.0) {
            let allowed = SocLimiter::default().apply(p, soc);
            prop_assert!(allowed.abs() <= p.abs());
            prop_assert!(allowed == 0.0 || allowed.signum() == p.signum());
        }

        #[test]
        fn charge_magnitude_shrinks_toward_full(p in -5000.0f64..-1.0, a in 90.0f64..100.0, b in 90.0f64..100.0) {
            let limiter = SocLimiter::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(limiter.apply(p, hi).abs() <= limiter.apply(p, lo).abs());
        }

        #[test]
        fn discharge_magnitude_shrinks_toward_floor(p in 1.0f64..5000.0, a in 5.0f64..10.0, b in 5.0f64..10.0) {
            let limiter = SocLimiter::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(limiter.apply(p, lo).abs() <= limiter.apply(p, hi).abs());
        }
    }
}
