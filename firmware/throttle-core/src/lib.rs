//! Throttle shaping for a nunchuk-controlled electric skateboard.
//!
//! The crate is split the way the board is wired:
//!
//! - [`input`]: one cycle's controller reading, plus nunchuk report decoding.
//! - [`limiter`]: the positive-only, ceiling-based rate limiter.
//! - [`cruise`]: cruise control / drag brake tracking with resume memory.
//! - [`engine`]: the per-tick mode classifier that composes the above.
//! - [`config`] and [`tuning`]: persisted rider settings and fixed thresholds.
//! - [`esc`]: level to servo pulse mapping for the speed controller.
//! - [`control`]: the control loop over the board's I/O collaborators.
//!
//! Everything here is host-testable; the board crate only supplies drivers.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;
pub mod control;
pub mod cruise;
pub mod engine;
pub mod error;
pub mod esc;
pub mod input;
pub mod limiter;
pub mod tuning;

pub use config::{AccelProfile, Config, StoredConfig};
pub use control::{load_config, ConfigStore, ControlLoop, EscOutput, InputSource};
pub use cruise::{CruiseMode, CruiseTracker};
pub use engine::{ThrottleEngine, ThrottleMode};
pub use error::{ConfigError, StorageError};
pub use esc::{EscMode, EscSignal};
pub use input::{InputSample, Nunchuk};
pub use limiter::{RateLimiter, Rates};
pub use tuning::{CruiseTuning, Tuning};

/// Milliseconds since boot, as seen by the control loop.
pub type Millis = u64;

/// Clamp a level to [-1, 1]. NaN collapses to 0.
pub fn clamp_level(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Clamp a level to [0, 1]. NaN collapses to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub(crate) fn magnitude(value: f32) -> f32 {
    if value < 0.0 {
        -value
    } else {
        value
    }
}

/// Linear remap of `x` from [in_min, in_max] onto [out_min, out_max].
pub(crate) fn map_range(x: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

#[cfg(test)]
pub(crate) fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}
