//! Fixed thresholds and rates. Firmware variants disagree on several of these,
//! so they are plain data with defaults rather than hard-coded constants.

use crate::error::ConfigError;
use crate::limiter::Rates;
use crate::Millis;

/// Stick deflection treated as centered.
pub const DEADZONE: f32 = 0.05;
/// Per-tick multiplier applied to positive power while coasting.
pub const COAST_DECAY: f32 = 0.75;
/// Limiter targets below this collapse to zero.
pub const ZERO_BELOW: f32 = 0.003;
/// Fraction of the excess over the floor shed per tick when the dead-man
/// stick is eased back.
pub const DEAD_MAN_EASE: f32 = 0.1;

pub const POWER_RATES: Rates = Rates::new(0.002, 0.005);
pub const BRAKE_RATES: Rates = Rates::new(0.020, 0.020);
pub const CRUISE_RATES: Rates = Rates::new(0.001, 0.003);
pub const DRAG_RATES: Rates = Rates::new(0.003, 0.003);

/// Cruise tracker thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CruiseTuning {
    /// |Y| beyond this accelerates or decelerates the cruise level.
    pub branch_threshold: f32,
    /// How long a released cruise level stays resumable.
    pub return_window_ms: Millis,
    /// Rise multiplier while catching up to a resumed level.
    pub return_boost: f32,
    /// Catch-up restarts from the caller's command below this level.
    pub catch_up_floor: f32,
    /// |X| beyond this (with Y centered) counts toward the commit gesture.
    pub commit_threshold: f32,
    /// Consecutive gesture ticks needed to commit a new floor.
    pub commit_ticks: u16,
}

impl Default for CruiseTuning {
    fn default() -> Self {
        Self {
            branch_threshold: 0.25,
            return_window_ms: 5000,
            return_boost: 4.0,
            catch_up_floor: DEADZONE,
            commit_threshold: 0.75,
            commit_ticks: 150,
        }
    }
}

impl CruiseTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        in_open_unit("branch_threshold", self.branch_threshold)?;
        in_open_unit("commit_threshold", self.commit_threshold)?;
        if !(0.0..1.0).contains(&self.catch_up_floor) {
            return Err(ConfigError::OutOfRange {
                name: "catch_up_floor",
                value: self.catch_up_floor,
                low: 0.0,
                high: 1.0,
            });
        }
        if !self.return_boost.is_finite() || self.return_boost <= 0.0 {
            return Err(ConfigError::InvalidRate {
                name: "return_boost",
                value: self.return_boost,
            });
        }
        if self.commit_ticks == 0 {
            return Err(ConfigError::Zero("commit_ticks"));
        }
        Ok(())
    }
}

/// Everything the throttle engine needs besides the rider's [`Config`].
///
/// [`Config`]: crate::config::Config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub deadzone: f32,
    pub coast_decay: f32,
    pub zero_below: f32,
    pub dead_man_ease: f32,
    pub power: Rates,
    pub brake: Rates,
    pub cruise: Rates,
    pub drag: Rates,
    pub cruise_tuning: CruiseTuning,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            deadzone: DEADZONE,
            coast_decay: COAST_DECAY,
            zero_below: ZERO_BELOW,
            dead_man_ease: DEAD_MAN_EASE,
            power: POWER_RATES,
            brake: BRAKE_RATES,
            cruise: CRUISE_RATES,
            drag: DRAG_RATES,
            cruise_tuning: CruiseTuning::default(),
        }
    }
}

impl Tuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        in_open_unit("deadzone", self.deadzone)?;
        if !(0.0..=1.0).contains(&self.coast_decay) {
            return Err(ConfigError::OutOfRange {
                name: "coast_decay",
                value: self.coast_decay,
                low: 0.0,
                high: 1.0,
            });
        }
        if !(0.0..1.0).contains(&self.zero_below) {
            return Err(ConfigError::InvalidZeroBelow(self.zero_below));
        }
        in_open_unit("dead_man_ease", self.dead_man_ease)?;
        self.power.validate("power")?;
        self.brake.validate("brake")?;
        self.cruise.validate("cruise")?;
        self.drag.validate("drag brake")?;
        self.cruise_tuning.validate()
    }
}

fn in_open_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            low: 0.0,
            high: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(Tuning::default().validate(), Ok(()));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let tuning = Tuning {
            brake: Rates::new(0.02, 0.0),
            ..Tuning::default()
        };
        assert_eq!(
            tuning.validate(),
            Err(ConfigError::InvalidRate {
                name: "brake",
                value: 0.0
            })
        );
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let tuning = Tuning {
            deadzone: 1.2,
            ..Tuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::OutOfRange { name: "deadzone", .. })
        ));

        let tuning = Tuning {
            cruise_tuning: CruiseTuning {
                commit_ticks: 0,
                ..CruiseTuning::default()
            },
            ..Tuning::default()
        };
        assert_eq!(tuning.validate(), Err(ConfigError::Zero("commit_ticks")));

        let tuning = Tuning {
            dead_man_ease: 0.0,
            ..Tuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::OutOfRange { name: "dead_man_ease", .. })
        ));

        let tuning = Tuning {
            zero_below: 1.0,
            ..Tuning::default()
        };
        assert_eq!(tuning.validate(), Err(ConfigError::InvalidZeroBelow(1.0)));
    }
}
