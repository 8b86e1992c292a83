use crate::config::Config;
use crate::cruise::CruiseTracker;
use crate::error::ConfigError;
use crate::input::InputSample;
use crate::limiter::RateLimiter;
use crate::tuning::Tuning;
use crate::{clamp_level, magnitude, map_range, Millis};
use log::{debug, info};

/// Which path governs the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThrottleMode {
    #[default]
    Coast,
    Gas,
    BrakeStick,
    Cruise,
    /// Drag brake: cruise control in the braking direction.
    Brake,
    /// Both buttons: unshaped passthrough.
    Combined,
    /// Heli mode brake button: holds the cruise floor while pressed and
    /// drops to zero on release or a pulled-back stick.
    DeadMan,
}

/// Debounced button state. Once latched, a mode holds until both buttons
/// are released, so a thumb straddling both buttons does not chatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ButtonLatch {
    #[default]
    None,
    Cruise,
    Brake,
    Combined,
}

/// Per-tick throttle shaping: stick and buttons in, bounded command out.
#[derive(Debug, Clone)]
pub struct ThrottleEngine {
    tuning: Tuning,
    config: Config,
    power: RateLimiter,
    brake: RateLimiter,
    cruise: CruiseTracker,
    drag: CruiseTracker,
    latch: ButtonLatch,
    mode: ThrottleMode,
    command: f32,
    pending_save: bool,
}

impl ThrottleEngine {
    pub fn new(config: Config, tuning: Tuning) -> Result<Self, ConfigError> {
        tuning.validate()?;
        let config = config.sanitized();
        let mut engine = Self {
            tuning,
            config,
            power: RateLimiter::new(tuning.power, tuning.zero_below)?,
            brake: RateLimiter::new(tuning.brake, tuning.zero_below)?,
            cruise: CruiseTracker::new(tuning.cruise, config.auto_cruise_level, tuning.cruise_tuning)?,
            drag: CruiseTracker::new(tuning.drag, config.drag_brake_level, tuning.cruise_tuning)?,
            latch: ButtonLatch::None,
            mode: ThrottleMode::Coast,
            command: 0.0,
            pending_save: false,
        };
        engine.reinitialize(config);
        Ok(engine)
    }

    /// Apply new rider settings (after tuning, or at boot) and zero all state.
    pub fn reinitialize(&mut self, config: Config) {
        self.config = config.sanitized();
        let multiplier = self.config.accel_profile.multiplier();
        self.power.initialize(multiplier);
        self.brake.initialize(multiplier);
        self.cruise.initialize(multiplier, self.config.auto_cruise_level);
        self.drag.initialize(multiplier, self.config.drag_brake_level);
        self.latch = ButtonLatch::None;
        self.mode = ThrottleMode::Coast;
        self.command = 0.0;
        self.pending_save = false;
        info!(
            "throttle: max={:.2} cruise floor={:.2} drag={:.2} profile={:?} heli={}",
            self.config.max_throttle,
            self.config.auto_cruise_level,
            self.config.drag_brake_level,
            self.config.accel_profile,
            self.config.heli_mode
        );
    }

    /// Run one control tick and return the command for the ESC, in [-1, 1].
    pub fn update(&mut self, input: &InputSample, now: Millis) -> f32 {
        let input = input.clamped();
        self.latch = self.next_latch(&input);

        let mode = match self.latch {
            ButtonLatch::Cruise => ThrottleMode::Cruise,
            ButtonLatch::Brake if self.config.heli_mode => ThrottleMode::DeadMan,
            ButtonLatch::Brake => ThrottleMode::Brake,
            ButtonLatch::Combined => ThrottleMode::Combined,
            ButtonLatch::None if input.y > self.tuning.deadzone => ThrottleMode::Gas,
            ButtonLatch::None if input.y < -self.tuning.deadzone => ThrottleMode::BrakeStick,
            ButtonLatch::None => ThrottleMode::Coast,
        };
        if mode != self.mode {
            debug!("throttle: {:?} -> {:?} at {:.3}", self.mode, mode, self.command);
            self.mode = mode;
        }

        let result = match mode {
            ThrottleMode::Gas => self.gas(input.y),
            ThrottleMode::BrakeStick => self.brake_stick(input.y),
            ThrottleMode::Coast => self.coast(),
            ThrottleMode::Cruise => self.auto_cruise(&input, now),
            ThrottleMode::Brake => self.drag_brake(&input, now),
            ThrottleMode::Combined => self.combined(input.y),
            ThrottleMode::DeadMan => self.dead_man(input.y),
        };

        self.command = clamp_level(result.min(self.config.max_throttle));
        self.command
    }

    /// Drop to neutral and forget every limiter, tracker and latch.
    pub fn reset(&mut self) {
        self.power.reset();
        self.brake.reset();
        self.cruise.zero();
        self.drag.zero();
        self.latch = ButtonLatch::None;
        self.mode = ThrottleMode::Coast;
        self.command = 0.0;
    }

    /// The settings changed by a hold gesture since the last call, if any.
    pub fn take_config_update(&mut self) -> Option<Config> {
        if self.pending_save {
            self.pending_save = false;
            Some(self.config)
        } else {
            None
        }
    }

    pub fn command(&self) -> f32 {
        self.command
    }

    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cruise(&self) -> &CruiseTracker {
        &self.cruise
    }

    pub fn drag(&self) -> &CruiseTracker {
        &self.drag
    }

    fn next_latch(&self, input: &InputSample) -> ButtonLatch {
        match (input.button_a, input.button_b) {
            (false, false) => ButtonLatch::None,
            (true, true) if self.combined_allowed(input) => ButtonLatch::Combined,
            (true, false) if self.latch == ButtonLatch::None => ButtonLatch::Cruise,
            (false, true) if self.latch == ButtonLatch::None => ButtonLatch::Brake,
            _ => self.latch,
        }
    }

    fn combined_allowed(&self, input: &InputSample) -> bool {
        magnitude(input.y) <= self.tuning.deadzone
            && self.command >= -self.config.drag_brake_level
            && self.command <= self.config.auto_cruise_level
    }

    fn gas(&mut self, y: f32) -> f32 {
        let dz = self.tuning.deadzone;
        let floor = self.config.auto_cruise_level;
        let out = if self.command < dz {
            // coming off the brake or from rest: start at the floor
            self.power.force_set(dz.max(floor));
            self.power.last_output()
        } else {
            let target = map_range(y, dz, 1.0, floor, self.config.max_throttle);
            self.power.limit(target)
        };
        self.brake.limit(0.0);
        self.cruise.zero();
        self.drag.zero();
        out
    }

    fn brake_stick(&mut self, y: f32) -> f32 {
        let dz = self.tuning.deadzone;
        let floor = self.config.drag_brake_level;
        let out = if self.command > -dz {
            self.brake.force_set(dz.max(floor));
            self.brake.last_output()
        } else {
            let target = -map_range(y, -dz, -1.0, -floor, -1.0);
            self.brake.limit(target)
        };
        self.power.limit(0.0);
        self.cruise.zero();
        self.drag.zero();
        -out
    }

    fn coast(&mut self) -> f32 {
        self.cruise.coast();
        self.drag.coast();
        let target = if self.command > 0.0 {
            self.command * self.tuning.coast_decay
        } else {
            0.0
        };
        self.brake.limit(0.0);
        self.power.limit(target)
    }

    fn auto_cruise(&mut self, input: &InputSample, now: Millis) -> f32 {
        let out = self
            .cruise
            .update(self.command.max(0.0), input.x, input.y, now);
        self.power.force_set(out);
        self.brake.reset();
        self.drag.interrupt_gesture();
        if let Some(level) = self.cruise.take_committed() {
            self.config.auto_cruise_level = level;
            self.pending_save = true;
        }
        out
    }

    fn drag_brake(&mut self, input: &InputSample, now: Millis) -> f32 {
        let out = self
            .drag
            .update((-self.command).max(0.0), input.x, -input.y, now);
        self.brake.force_set(out);
        self.power.reset();
        self.cruise.interrupt_gesture();
        if let Some(level) = self.drag.take_committed() {
            self.config.drag_brake_level = level;
            self.pending_save = true;
        }
        -out
    }

    fn dead_man(&mut self, y: f32) -> f32 {
        let dz = self.tuning.deadzone;
        let floor = self.config.auto_cruise_level;
        let target = map_range(y, dz, 1.0, floor, self.config.max_throttle);
        let out = if y < -dz {
            self.power.force_set(0.0);
            0.0
        } else if self.command < floor {
            self.power.force_set(floor);
            self.power.last_output()
        } else if self.command > target && target <= floor {
            // stick eased back: shed a fraction of the excess each tick
            let excess = self.command - floor;
            self.power.limit(self.command - excess * self.tuning.dead_man_ease)
        } else {
            self.power.limit(target)
        };
        self.brake.limit(0.0);
        self.cruise.zero();
        self.drag.zero();
        out
    }

    fn combined(&mut self, y: f32) -> f32 {
        let dz = self.tuning.deadzone;
        let out = if y > dz {
            map_range(y, dz, 1.0, dz, self.config.max_throttle)
        } else if y < -dz {
            y
        } else {
            0.0
        };
        self.power.force_set(out.max(0.0));
        self.brake.force_set((-out).max(0.0));
        self.cruise.zero();
        self.drag.zero();
        out
    }
}
