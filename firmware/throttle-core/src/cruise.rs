use crate::error::ConfigError;
use crate::limiter::{Rates, MIN_MULTIPLIER};
use crate::tuning::CruiseTuning;
use crate::{clamp_level, clamp_unit, magnitude, Millis};
use log::{debug, info};

/// Largest accel profile multiplier applied to cruise rates.
pub const MAX_CRUISE_MULTIPLIER: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CruiseMode {
    #[default]
    Normal,
    Returning,
    Accelerating,
    Decelerating,
}

/// The last cruise level and when it was last held, for resuming after a
/// brief release.
#[derive(Debug, Clone, Copy, Default)]
struct ResumeMemory {
    level: f32,
    at: Option<Millis>,
}

impl ResumeMemory {
    fn remember(&mut self, level: f32, now: Millis) {
        self.level = level;
        self.at = Some(now);
    }

    fn touch(&mut self, now: Millis) {
        self.at = Some(now);
    }

    fn coast(&mut self, decrement: f32) {
        self.level = (self.level - decrement).max(0.0);
    }

    fn is_fresh(&self, now: Millis, window: Millis) -> bool {
        self.at.is_some_and(|at| now.saturating_sub(at) <= window)
    }
}

/// Cruise control for one direction.
///
/// The power side holds and nudges a throttle level; the brake side is the
/// same machine fed with negated inputs ("drag brake"). All levels here are
/// positive, in [0, 1].
#[derive(Debug, Clone)]
pub struct CruiseTracker {
    base: Rates,
    rise: f32,
    fall: f32,
    auto_level: f32,
    previous: f32,
    mode: CruiseMode,
    memory: ResumeMemory,
    hold_ticks: u16,
    committed: Option<f32>,
    tuning: CruiseTuning,
}

impl CruiseTracker {
    pub fn new(base: Rates, auto_level: f32, tuning: CruiseTuning) -> Result<Self, ConfigError> {
        base.validate("cruise")?;
        tuning.validate()?;
        Ok(Self {
            base,
            rise: base.rise,
            fall: base.fall,
            auto_level: clamp_unit(auto_level),
            previous: 0.0,
            mode: CruiseMode::Normal,
            memory: ResumeMemory::default(),
            hold_ticks: 0,
            committed: None,
            tuning,
        })
    }

    /// Apply a new accel profile multiplier and floor, and zero the state.
    pub fn initialize(&mut self, multiplier: f32, auto_level: f32) {
        let multiplier = if multiplier.is_nan() {
            1.0
        } else {
            multiplier.clamp(MIN_MULTIPLIER, MAX_CRUISE_MULTIPLIER)
        };
        let scaled = self.base.scaled(multiplier);
        self.rise = scaled.rise;
        self.fall = scaled.fall;
        self.auto_level = clamp_unit(auto_level);
        self.committed = None;
        self.mode = CruiseMode::Normal;
        self.zero();
    }

    /// Advance one tick. `current` is the caller's present command in this
    /// tracker's direction; returns the new cruise level.
    pub fn update(&mut self, current: f32, stick_x: f32, stick_y: f32, now: Millis) -> f32 {
        let current = clamp_unit(current);
        let stick_x = clamp_level(stick_x);
        let stick_y = clamp_level(stick_y);
        let threshold = self.tuning.branch_threshold;

        let mode = if stick_y > threshold {
            CruiseMode::Accelerating
        } else if stick_y < -threshold {
            CruiseMode::Decelerating
        } else if self.previous == 0.0 {
            if self.memory.is_fresh(now, self.tuning.return_window_ms)
                && self.memory.level > self.auto_level
            {
                CruiseMode::Returning
            } else {
                CruiseMode::Normal
            }
        } else if self.mode != CruiseMode::Returning {
            CruiseMode::Normal
        } else {
            CruiseMode::Returning
        };
        if mode != self.mode {
            debug!("cruise: {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;

        let output = match self.mode {
            CruiseMode::Returning if current >= self.memory.level => {
                self.mode = CruiseMode::Normal;
                self.memory.remember(current, now);
                current
            }
            CruiseMode::Returning => {
                if self.previous < self.tuning.catch_up_floor {
                    self.previous = current;
                }
                // keep the window open without changing the level
                self.memory.touch(now);
                (self.previous + self.rise * self.tuning.return_boost).min(1.0)
            }
            CruiseMode::Accelerating => {
                let level = (self.previous.max(current) + stick_y * self.rise).min(1.0);
                self.memory.remember(level, now);
                level
            }
            CruiseMode::Decelerating => {
                let level = (self.previous.min(current) + stick_y * self.fall).max(0.0);
                self.memory.remember(level, now);
                level
            }
            CruiseMode::Normal => {
                let level = current.max(self.auto_level);
                self.memory.remember(level, now);
                level
            }
        };

        self.track_commit_gesture(output, stick_x, stick_y);
        self.previous = output;
        output
    }

    /// Idle tick: drop the held level and let the resume memory fade.
    pub fn coast(&mut self) {
        self.previous = 0.0;
        self.hold_ticks = 0;
        self.memory.coast(self.fall / 2.0);
    }

    /// Forget everything, including the resume memory.
    pub fn zero(&mut self) {
        self.previous = 0.0;
        self.hold_ticks = 0;
        self.memory = ResumeMemory::default();
    }

    /// Break a commit gesture in progress without touching cruise state.
    pub fn interrupt_gesture(&mut self) {
        self.hold_ticks = 0;
    }

    /// A floor committed by the hold gesture since the last call, if any.
    pub fn take_committed(&mut self) -> Option<f32> {
        self.committed.take()
    }

    pub fn auto_level(&self) -> f32 {
        self.auto_level
    }

    pub fn mode(&self) -> CruiseMode {
        self.mode
    }

    pub fn previous(&self) -> f32 {
        self.previous
    }

    pub fn remembered_level(&self) -> f32 {
        self.memory.level
    }

    fn track_commit_gesture(&mut self, output: f32, stick_x: f32, stick_y: f32) {
        let centered = magnitude(stick_y) < self.tuning.branch_threshold;
        if !centered || magnitude(stick_x) <= self.tuning.commit_threshold {
            self.hold_ticks = 0;
            return;
        }

        self.hold_ticks += 1;
        if self.hold_ticks >= self.tuning.commit_ticks {
            self.hold_ticks = 0;
            self.auto_level = clamp_unit(output);
            self.committed = Some(self.auto_level);
            info!("cruise floor committed at {:.2}", self.auto_level);
        }
    }
}
