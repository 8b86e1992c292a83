//! Rider settings and their persisted form.
//!
//! Settings are stored as whole percentages, one byte each, inside a
//! versioned CBOR record. `0xFF` in any byte means "never set", the same
//! value an erased EEPROM or flash cell reads back as.

use alloc::vec::Vec;
use log::warn;
use minicbor::{Decode, Encode};

use crate::clamp_unit;
use crate::error::StorageError;
use crate::esc::EscMode;
use crate::limiter::RAW_MULTIPLIER;

/// Sentinel for an unset stored byte.
pub const UNSET: u8 = 0xFF;
/// Version of [`StoredConfig`] written by this firmware.
pub const CONFIG_VERSION: u8 = 1;

pub const DEFAULT_MAX_THROTTLE: f32 = 1.0;
pub const DEFAULT_AUTO_CRUISE: f32 = 0.0;
pub const DEFAULT_DRAG_BRAKE: f32 = 0.05;

/// Global acceleration feel; scales every rise/fall rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelProfile {
    Softest,
    Soft,
    #[default]
    Normal,
    Firm,
    Brisk,
    Hard,
    /// Rate limiting effectively disabled.
    Raw,
}

impl AccelProfile {
    pub const ALL: [AccelProfile; 7] = [
        AccelProfile::Softest,
        AccelProfile::Soft,
        AccelProfile::Normal,
        AccelProfile::Firm,
        AccelProfile::Brisk,
        AccelProfile::Hard,
        AccelProfile::Raw,
    ];

    /// Unknown indices (including [`UNSET`]) fall back to `Normal`.
    pub fn from_index(index: u8) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(AccelProfile::Normal)
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn multiplier(self) -> f32 {
        match self {
            AccelProfile::Softest => 0.5,
            AccelProfile::Soft => 0.75,
            AccelProfile::Normal => 1.0,
            AccelProfile::Firm => 1.25,
            AccelProfile::Brisk => 1.5,
            AccelProfile::Hard => 2.0,
            AccelProfile::Raw => RAW_MULTIPLIER,
        }
    }
}

/// Rider-adjustable settings, read at startup and after tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Ceiling on positive output, [0, 1].
    pub max_throttle: f32,
    /// Floor of power cruise control, [0, 1].
    pub auto_cruise_level: f32,
    /// Floor of the drag brake, [0, 1] (applied as negative output).
    pub drag_brake_level: f32,
    pub accel_profile: AccelProfile,
    /// Forward-only ESC: the brake button becomes a dead-man throttle and
    /// the servo range carries no reverse half.
    pub heli_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_throttle: DEFAULT_MAX_THROTTLE,
            auto_cruise_level: DEFAULT_AUTO_CRUISE,
            drag_brake_level: DEFAULT_DRAG_BRAKE,
            accel_profile: AccelProfile::default(),
            heli_mode: false,
        }
    }
}

impl Config {
    /// Clamp every level to [0, 1]; non-finite values revert to defaults.
    pub fn sanitized(self) -> Self {
        Self {
            max_throttle: finite_unit_or(self.max_throttle, DEFAULT_MAX_THROTTLE),
            auto_cruise_level: finite_unit_or(self.auto_cruise_level, DEFAULT_AUTO_CRUISE),
            drag_brake_level: finite_unit_or(self.drag_brake_level, DEFAULT_DRAG_BRAKE),
            accel_profile: self.accel_profile,
            heli_mode: self.heli_mode,
        }
    }

    /// How the ESC signal lays out a level for these settings.
    pub fn esc_mode(&self) -> EscMode {
        if self.heli_mode {
            EscMode::Heli
        } else {
            EscMode::Bidirectional
        }
    }

    pub fn to_stored(&self) -> StoredConfig {
        StoredConfig {
            version: CONFIG_VERSION,
            max_throttle_pct: to_percent(self.max_throttle),
            auto_cruise_pct: to_percent(self.auto_cruise_level),
            drag_brake_pct: to_percent(self.drag_brake_level),
            accel_profile: self.accel_profile.index(),
            heli_mode: Some(u8::from(self.heli_mode)),
        }
    }

    /// Field-by-field fallback: any unset or out-of-range byte takes its
    /// default.
    pub fn from_stored(stored: &StoredConfig) -> Self {
        Self {
            max_throttle: percent_or(stored.max_throttle_pct, DEFAULT_MAX_THROTTLE),
            auto_cruise_level: percent_or(stored.auto_cruise_pct, DEFAULT_AUTO_CRUISE),
            drag_brake_level: percent_or(stored.drag_brake_pct, DEFAULT_DRAG_BRAKE),
            accel_profile: AccelProfile::from_index(stored.accel_profile),
            heli_mode: stored.heli_mode == Some(1),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        minicbor::to_vec(self.to_stored()).map_err(|_| StorageError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        let stored: StoredConfig = minicbor::decode(bytes).map_err(StorageError::Decode)?;
        if stored.version != CONFIG_VERSION {
            return Err(StorageError::Version(stored.version));
        }
        Ok(Self::from_stored(&stored))
    }

    /// Decode a stored record, falling back to defaults when it is missing
    /// or unreadable.
    pub fn decode_or_default(bytes: Option<&[u8]>) -> Self {
        match bytes.map(Self::decode) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                warn!("ignoring stored settings: {}", e);
                Self::default()
            }
            None => Self::default(),
        }
    }
}

/// On-storage layout of [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct StoredConfig {
    #[n(0)]
    pub version: u8,
    #[n(1)]
    pub max_throttle_pct: u8,
    #[n(2)]
    pub auto_cruise_pct: u8,
    #[n(3)]
    pub drag_brake_pct: u8,
    #[n(4)]
    pub accel_profile: u8,
    /// 1 for heli mode. Absent in records written before the flag existed.
    #[n(5)]
    pub heli_mode: Option<u8>,
}

impl StoredConfig {
    /// A record with every field unset, as read from erased storage.
    pub const fn unset() -> Self {
        Self {
            version: CONFIG_VERSION,
            max_throttle_pct: UNSET,
            auto_cruise_pct: UNSET,
            drag_brake_pct: UNSET,
            accel_profile: UNSET,
            heli_mode: Some(UNSET),
        }
    }
}

fn percent_or(stored: u8, default: f32) -> f32 {
    if stored > 100 {
        default
    } else {
        f32::from(stored) * 0.01
    }
}

fn to_percent(level: f32) -> u8 {
    (clamp_unit(level) * 100.0 + 0.5) as u8
}

fn finite_unit_or(value: f32, default: f32) -> f32 {
    if value.is_finite() {
        clamp_unit(value)
    } else {
        default
    }
}
