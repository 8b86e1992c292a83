use crate::clamp_level;
use log::warn;

/// One control cycle's controller reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSample {
    /// Secondary axis, [-1, 1]. Only used for hold gestures.
    pub x: f32,
    /// Primary axis, [-1, 1]. Positive accelerates, negative brakes.
    pub y: f32,
    /// Cruise button (nunchuk C).
    pub button_a: bool,
    /// Brake button (nunchuk Z).
    pub button_b: bool,
}

impl InputSample {
    pub fn new(x: f32, y: f32, button_a: bool, button_b: bool) -> Self {
        Self {
            x: clamp_level(x),
            y: clamp_level(y),
            button_a,
            button_b,
        }
    }

    /// Stick at rest, no buttons.
    pub fn centered() -> Self {
        Self::default()
    }

    pub fn clamped(self) -> Self {
        Self::new(self.x, self.y, self.button_a, self.button_b)
    }
}

/// Length of a nunchuk status report.
pub const REPORT_LEN: usize = 6;
/// I2C address of a nunchuk.
pub const NUNCHUK_ADDR: u8 = 0x52;
/// Register writes that switch a nunchuk to unencrypted reports.
pub const INIT_SEQUENCE: [[u8; 2]; 2] = [[0xF0, 0x55], [0xFB, 0x00]];

pub const DEFAULT_CENTER: u8 = 128;
const DEFAULT_LOW: u8 = 15;
const DEFAULT_HIGH: u8 = 200;
/// A stored center further than this from [`DEFAULT_CENTER`] is ignored.
pub const CENTER_TOLERANCE: u8 = 25;
/// Identical activity words in a row before the controller counts as idle.
pub const INACTIVITY_READS: u16 = 250;

/// One stick axis with a calibrated zero and self-widening travel.
#[derive(Debug, Clone, Copy)]
struct Axis {
    zero: u8,
    low: u8,
    high: u8,
}

impl Axis {
    const fn new(zero: u8) -> Self {
        Self {
            zero,
            low: DEFAULT_LOW,
            high: DEFAULT_HIGH,
        }
    }

    fn observe(&mut self, raw: u8) {
        self.low = self.low.min(raw);
        self.high = self.high.max(raw);
    }

    fn normalize(&self, raw: u8) -> f32 {
        let centered = i16::from(raw) - i16::from(self.zero);
        let span = if centered > 0 {
            i16::from(self.high) - i16::from(self.zero)
        } else {
            i16::from(self.zero) - i16::from(self.low)
        };
        if centered == 0 || span <= 0 {
            return 0.0;
        }
        clamp_level(f32::from(centered) / f32::from(span))
    }
}

/// Decodes raw nunchuk reports into [`InputSample`]s.
#[derive(Debug, Clone)]
pub struct Nunchuk {
    x: Axis,
    y: Axis,
    last_activity: u16,
    sameness: u16,
}

impl Default for Nunchuk {
    fn default() -> Self {
        Self::new()
    }
}

impl Nunchuk {
    pub fn new() -> Self {
        Self {
            x: Axis::new(DEFAULT_CENTER),
            y: Axis::new(DEFAULT_CENTER),
            last_activity: 0,
            sameness: 0,
        }
    }

    /// Start from a previously stored Y center, if it is plausible.
    pub fn with_center(stored: u8) -> Self {
        let mut chuck = Self::new();
        if stored.abs_diff(DEFAULT_CENTER) <= CENTER_TOLERANCE {
            chuck.y.zero = stored;
        } else {
            warn!("ignoring stored stick center {}", stored);
        }
        chuck
    }

    /// Take the current stick position as center.
    pub fn calibrate_center(&mut self, report: &[u8; REPORT_LEN]) {
        self.x.zero = report[0];
        self.y.zero = report[1];
    }

    /// Y center, for persisting.
    pub fn center(&self) -> u8 {
        self.y.zero
    }

    pub fn decode(&mut self, report: &[u8; REPORT_LEN]) -> InputSample {
        self.x.observe(report[0]);
        self.y.observe(report[1]);

        let activity = activity_word(report);
        if activity == self.last_activity {
            self.sameness = (self.sameness + 1).min(INACTIVITY_READS);
        } else {
            self.sameness = 0;
            self.last_activity = activity;
        }

        InputSample::new(
            self.x.normalize(report[0]),
            self.y.normalize(report[1]),
            report[5] & 0b10 == 0,
            report[5] & 0b01 == 0,
        )
    }

    /// Whether the reports still change, i.e. someone is holding it.
    pub fn is_active(&self) -> bool {
        self.sameness < INACTIVITY_READS
    }
}

/// Low bits of every axis plus the button byte; a hand-held controller never
/// reports the same word for long.
fn activity_word(report: &[u8; REPORT_LEN]) -> u16 {
    let mut activity = u16::from(report[0] & 0b01);
    activity = (activity << 1) | u16::from(report[1] & 0b01);
    for byte in &report[2..5] {
        activity = (activity << 2) | u16::from(byte & 0b11);
    }
    (activity << 8) | u16::from(report[5])
}
