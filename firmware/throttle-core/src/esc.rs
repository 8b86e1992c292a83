use crate::{clamp_level, Millis};
use log::info;

/// Servo pulse at angle 0 (full reverse / brake).
pub const MIN_PULSE_US: u32 = 1000;
/// Servo pulse at angle 180 (full throttle).
pub const MAX_PULSE_US: u32 = 2000;
pub const PERIOD_US: u32 = 20_000;
pub const NEUTRAL_ANGLE: u8 = 90;
/// Re-send an unchanged angle at least this often.
pub const DEFAULT_REFRESH_MS: Millis = 1000;
/// How long each arming step is held.
pub const ARMING_STEP_MS: Millis = 500;

/// How a level is laid out over the servo range. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscMode {
    /// Neutral at 90; brake below, throttle above.
    #[default]
    Bidirectional,
    /// Forward only: anything at or below zero is angle 0.
    Heli,
}

impl EscMode {
    pub fn angle(self, level: f32) -> u8 {
        let level = clamp_level(level);
        match self {
            EscMode::Bidirectional => (90.0 + 90.0 * level + 0.5) as u8,
            EscMode::Heli if level <= 0.0 => 0,
            EscMode::Heli => (180.0 * level + 0.5) as u8,
        }
    }
}

/// Convert a servo angle (0-180) to a pulse width in microseconds.
pub fn angle_to_pulse_us(angle: u8) -> u32 {
    let angle = u32::from(angle.min(180));
    MIN_PULSE_US + angle * (MAX_PULSE_US - MIN_PULSE_US) / 180
}

/// Convert a pulse width to an LEDC duty value for a timer with `max_duty`.
pub fn pulse_to_duty(pulse_us: u32, max_duty: u32) -> u32 {
    // u64 so 14-bit (or wider) duty resolutions cannot overflow
    (u64::from(pulse_us) * u64::from(max_duty) / u64::from(PERIOD_US)) as u32
}

/// Levels and hold times that arm a hobby ESC: full, reverse, neutral.
pub fn arming_sequence() -> [(f32, Millis); 3] {
    [
        (1.0, ARMING_STEP_MS),
        (-1.0, ARMING_STEP_MS),
        (0.0, ARMING_STEP_MS),
    ]
}

/// Turns engine levels into pulses and decides when a write is needed.
#[derive(Debug, Clone)]
pub struct EscSignal {
    mode: EscMode,
    refresh_ms: Millis,
    last: Option<(u8, Millis)>,
}

impl EscSignal {
    pub fn new(mode: EscMode) -> Self {
        Self::with_refresh(mode, DEFAULT_REFRESH_MS)
    }

    pub fn with_refresh(mode: EscMode, refresh_ms: Millis) -> Self {
        info!("esc: {:?} mode, refresh {} ms", mode, refresh_ms);
        Self {
            mode,
            refresh_ms,
            last: None,
        }
    }

    /// The pulse to write for `level`, or `None` if the last write already
    /// carries the same angle and is recent enough.
    pub fn pulse_for(&mut self, level: f32, now: Millis) -> Option<u32> {
        let angle = self.mode.angle(level);
        if let Some((last_angle, at)) = self.last {
            if last_angle == angle && now.saturating_sub(at) < self.refresh_ms {
                return None;
            }
        }
        self.last = Some((angle, now));
        Some(angle_to_pulse_us(angle))
    }

    /// Force the next `pulse_for` to write.
    pub fn forget(&mut self) {
        self.last = None;
    }

    pub fn mode(&self) -> EscMode {
        self.mode
    }
}
