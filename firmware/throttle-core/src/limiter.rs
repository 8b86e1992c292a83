use crate::clamp_unit;
use crate::error::ConfigError;
use log::debug;

/// Smallest accel profile multiplier a limiter accepts.
pub const MIN_MULTIPLIER: f32 = 0.5;
/// Multiplier of the "raw" profile; large enough that ramping never binds.
pub const RAW_MULTIPLIER: f32 = 100.0;

/// Per-tick rise and fall rates, as a fraction of full scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub rise: f32,
    pub fall: f32,
}

impl Rates {
    pub const fn new(rise: f32, fall: f32) -> Self {
        Self { rise, fall }
    }

    /// Both rates must be finite and strictly positive.
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        for value in [self.rise, self.fall] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidRate { name, value });
            }
        }
        Ok(())
    }

    pub fn scaled(self, multiplier: f32) -> Self {
        Self {
            rise: self.rise * multiplier,
            fall: self.fall * multiplier,
        }
    }
}

/// Positive-only rate limiter with a moving ceiling.
///
/// Climbing is always ramped: the ceiling rises by at most `rise` per call and
/// the output is pinned to it. Dropping is immediate: the output follows the
/// target while the ceiling trails down by `fall` per call. The same type
/// shapes both the power and the brake direction.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    base: Rates,
    rise: f32,
    fall: f32,
    zero_below: f32,
    last_output: f32,
    ceiling: f32,
}

impl RateLimiter {
    pub fn new(base: Rates, zero_below: f32) -> Result<Self, ConfigError> {
        base.validate("limiter")?;
        if !(0.0..1.0).contains(&zero_below) {
            return Err(ConfigError::InvalidZeroBelow(zero_below));
        }
        Ok(Self {
            base,
            rise: base.rise,
            fall: base.fall,
            zero_below,
            last_output: 0.0,
            ceiling: 0.0,
        })
    }

    /// Rescale the rates from their base values by an accel profile
    /// multiplier and zero the state.
    pub fn initialize(&mut self, multiplier: f32) {
        let multiplier = if multiplier.is_nan() {
            1.0
        } else {
            multiplier.clamp(MIN_MULTIPLIER, RAW_MULTIPLIER)
        };
        let scaled = self.base.scaled(multiplier);
        self.rise = scaled.rise;
        self.fall = scaled.fall;
        debug!(
            "limiter init: multiplier={} rise={} fall={}",
            multiplier, self.rise, self.fall
        );
        self.reset();
    }

    /// Shape `target` and return the new output.
    pub fn limit(&mut self, target: f32) -> f32 {
        let mut target = clamp_unit(target);
        if target < self.zero_below {
            target = 0.0;
        }

        let output = if target > self.ceiling + self.rise {
            self.ceiling = (self.ceiling + self.rise).min(1.0);
            self.ceiling
        } else if target < self.ceiling - self.fall {
            self.ceiling = (self.ceiling - self.fall).max(0.0);
            target
        } else {
            target
        };

        self.last_output = output;
        output
    }

    /// Jump straight to `value`, bypassing the ramp.
    pub fn force_set(&mut self, value: f32) {
        let value = clamp_unit(value);
        self.ceiling = value;
        self.last_output = value;
    }

    /// Force the limiter up to `value` if its ceiling is lower.
    pub fn prime_if_below(&mut self, value: f32) {
        if self.ceiling < value {
            self.force_set(value);
        }
    }

    pub fn reset(&mut self) {
        self.ceiling = 0.0;
        self.last_output = 0.0;
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    pub fn last_output(&self) -> f32 {
        self.last_output
    }

    pub fn rates(&self) -> Rates {
        Rates::new(self.rise, self.fall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx;

    fn limiter(rise: f32, fall: f32) -> RateLimiter {
        RateLimiter::new(Rates::new(rise, fall), 0.0).unwrap()
    }

    #[test]
    fn test_rise_is_ramped() {
        let mut l = limiter(0.1, 0.2);
        assert!(approx(l.limit(1.0), 0.1));
        assert!(approx(l.limit(1.0), 0.2));
        assert!(approx(l.limit(1.0), 0.3));
        assert!(approx(l.ceiling(), 0.3));
    }

    #[test]
    fn test_ceiling_capped_at_one() {
        let mut l = limiter(0.3, 0.1);
        l.force_set(0.9);
        assert!(approx(l.limit(5.0), 1.0));
        assert!(approx(l.ceiling(), 1.0));
    }

    #[test]
    fn test_drop_passes_through_and_ceiling_trails() {
        let mut l = limiter(0.1, 0.2);
        l.force_set(0.5);
        assert_eq!(l.limit(0.0), 0.0);
        assert!(approx(l.ceiling(), 0.3));
        assert_eq!(l.limit(0.0), 0.0);
        assert!(approx(l.ceiling(), 0.1));
        l.limit(0.0);
        assert_eq!(l.ceiling(), 0.0);
    }

    #[test]
    fn test_inside_band_is_unshaped() {
        let mut l = limiter(0.1, 0.2);
        l.force_set(0.5);
        assert!(approx(l.limit(0.55), 0.55));
        assert!(approx(l.limit(0.4), 0.4));
        assert!(approx(l.ceiling(), 0.5));
    }

    #[test]
    fn test_negative_target_clamped() {
        let mut l = limiter(0.1, 0.2);
        l.force_set(0.5);
        assert_eq!(l.limit(-0.7), 0.0);
        assert_eq!(l.last_output(), 0.0);
    }

    #[test]
    fn test_targets_below_zero_threshold_snap_to_zero() {
        let mut l = RateLimiter::new(Rates::new(0.1, 0.2), 0.01).unwrap();
        l.force_set(0.02);
        assert!(approx(l.limit(0.015), 0.015));
        assert_eq!(l.limit(0.005), 0.0);
    }

    #[test]
    fn test_force_set_and_prime() {
        let mut l = limiter(0.1, 0.2);
        l.force_set(0.4);
        assert!(approx(l.last_output(), 0.4));
        l.prime_if_below(0.2);
        assert!(approx(l.ceiling(), 0.4));
        l.prime_if_below(0.6);
        assert!(approx(l.ceiling(), 0.6));
        assert!(approx(l.last_output(), 0.6));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut l = limiter(0.1, 0.2);
        l.force_set(0.7);
        l.reset();
        let (c1, o1) = (l.ceiling(), l.last_output());
        l.reset();
        assert_eq!((l.ceiling(), l.last_output()), (c1, o1));
        assert_eq!(c1, 0.0);
    }

    #[test]
    fn test_initialize_scales_and_clamps_multiplier() {
        let mut l = limiter(0.1, 0.2);
        l.initialize(2.0);
        assert!(approx(l.rates().rise, 0.2));
        assert!(approx(l.rates().fall, 0.4));

        l.initialize(0.1);
        assert!(approx(l.rates().rise, 0.05));

        l.initialize(f32::NAN);
        assert!(approx(l.rates().rise, 0.1));
    }

    #[test]
    fn test_raw_profile_effectively_unlimited() {
        let mut l = limiter(0.002, 0.005);
        l.initialize(RAW_MULTIPLIER);
        assert!(approx(l.limit(0.15), 0.15));
    }

    #[test]
    fn test_invalid_rates_rejected() {
        assert!(matches!(
            RateLimiter::new(Rates::new(0.0, 0.1), 0.0),
            Err(ConfigError::InvalidRate { .. })
        ));
        assert!(RateLimiter::new(Rates::new(0.1, -0.1), 0.0).is_err());
        assert!(RateLimiter::new(Rates::new(f32::INFINITY, 0.1), 0.0).is_err());
        assert!(matches!(
            RateLimiter::new(Rates::new(0.1, 0.1), -0.5),
            Err(ConfigError::InvalidZeroBelow(_))
        ));
    }
}
