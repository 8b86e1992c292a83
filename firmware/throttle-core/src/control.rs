//! The control loop, written against the board's I/O as traits so it runs
//! the same on the device and on the host.

use core::fmt::Debug;

use crate::config::Config;
use crate::engine::ThrottleEngine;
use crate::error::ConfigError;
use crate::input::InputSample;
use crate::tuning::Tuning;
use crate::Millis;
use log::{error, info, warn};

/// Source of one controller reading per tick.
pub trait InputSource {
    /// `None` when the controller is unreadable or idle.
    fn read(&mut self) -> Option<InputSample>;
}

/// Speed controller output.
pub trait EscOutput {
    type Error: Debug;

    /// Apply a command in [-1, 1]. Implementations decide when an unchanged
    /// command actually needs re-sending.
    fn apply_command(&mut self, level: f32, now: Millis) -> Result<(), Self::Error>;
}

/// Persistent storage for rider settings.
pub trait ConfigStore {
    type Error: Debug;

    /// `Ok(None)` when nothing has been stored yet.
    fn load(&mut self) -> Result<Option<Config>, Self::Error>;
    fn save(&mut self, config: &Config) -> Result<(), Self::Error>;
}

/// Read settings from `store`, falling back to defaults when they are
/// missing or unreadable.
pub fn load_config<S: ConfigStore>(store: &mut S) -> Config {
    match store.load() {
        Ok(Some(config)) => config.sanitized(),
        Ok(None) => {
            info!("no stored settings, using defaults");
            Config::default()
        }
        Err(e) => {
            warn!("failed to load settings, using defaults: {:?}", e);
            Config::default()
        }
    }
}

/// Owns the engine and its collaborators; call [`ControlLoop::tick`] once
/// per control period.
pub struct ControlLoop<I, E, S> {
    input: I,
    esc: E,
    store: S,
    engine: ThrottleEngine,
    controller_lost: bool,
}

impl<I, E, S> ControlLoop<I, E, S>
where
    I: InputSource,
    E: EscOutput,
    S: ConfigStore,
{
    pub fn new(input: I, esc: E, mut store: S, tuning: Tuning) -> Result<Self, ConfigError> {
        let config = load_config(&mut store);
        Self::with_config(input, esc, store, config, tuning)
    }

    /// Start from settings already read with [`load_config`], for boards
    /// that need them before the ESC is set up.
    pub fn with_config(
        input: I,
        esc: E,
        store: S,
        config: Config,
        tuning: Tuning,
    ) -> Result<Self, ConfigError> {
        let engine = ThrottleEngine::new(config, tuning)?;
        Ok(Self {
            input,
            esc,
            store,
            engine,
            controller_lost: false,
        })
    }

    /// Read, shape, write. Returns the command sent to the ESC.
    pub fn tick(&mut self, now: Millis) -> f32 {
        let level = match self.input.read() {
            Some(sample) => {
                if self.controller_lost {
                    info!("controller back");
                    self.controller_lost = false;
                }
                self.engine.update(&sample, now)
            }
            None => {
                if !self.controller_lost {
                    warn!("controller lost, holding neutral");
                    self.controller_lost = true;
                }
                self.engine.reset();
                0.0
            }
        };

        if let Err(e) = self.esc.apply_command(level, now) {
            error!("esc write failed: {:?}", e);
        }

        if let Some(config) = self.engine.take_config_update() {
            self.persist(&config);
        }
        level
    }

    /// Apply settings from the tuning session and store them.
    pub fn reinitialize(&mut self, config: Config) {
        self.engine.reinitialize(config);
        let config = *self.engine.config();
        self.persist(&config);
    }

    pub fn engine(&self) -> &ThrottleEngine {
        &self.engine
    }

    pub fn esc(&self) -> &E {
        &self.esc
    }

    pub fn esc_mut(&mut self) -> &mut E {
        &mut self.esc
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_controller_lost(&self) -> bool {
        self.controller_lost
    }

    fn persist(&mut self, config: &Config) {
        match self.store.save(config) {
            Ok(()) => info!("settings saved"),
            Err(e) => error!("failed to save settings: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx;
    use crate::config::AccelProfile;
    use crate::engine::ThrottleMode;
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    struct ScriptedInput(VecDeque<Option<InputSample>>);

    impl ScriptedInput {
        fn new(script: impl IntoIterator<Item = Option<InputSample>>) -> Self {
            Self(script.into_iter().collect())
        }
    }

    impl InputSource for ScriptedInput {
        fn read(&mut self) -> Option<InputSample> {
            self.0.pop_front().flatten()
        }
    }

    #[derive(Default)]
    struct RecordingEsc {
        writes: Vec<(f32, Millis)>,
        fail: bool,
    }

    impl EscOutput for RecordingEsc {
        type Error = &'static str;

        fn apply_command(&mut self, level: f32, now: Millis) -> Result<(), Self::Error> {
            if self.fail {
                return Err("bus fault");
            }
            self.writes.push((level, now));
            Ok(())
        }
    }

    /// Keeps the encoded record, like the NVS blob on the board.
    #[derive(Default)]
    struct MemoryStore {
        blob: Option<Vec<u8>>,
        saves: usize,
        broken: bool,
    }

    impl ConfigStore for MemoryStore {
        type Error = &'static str;

        fn load(&mut self) -> Result<Option<Config>, Self::Error> {
            if self.broken {
                return Err("flash read failed");
            }
            Ok(self.blob.as_deref().map(|b| Config::decode_or_default(Some(b))))
        }

        fn save(&mut self, config: &Config) -> Result<(), Self::Error> {
            if self.broken {
                return Err("flash write failed");
            }
            self.blob = Some(config.encode().map_err(|_| "encode failed")?);
            self.saves += 1;
            Ok(())
        }
    }

    fn stick(x: f32, y: f32, a: bool, b: bool) -> Option<InputSample> {
        Some(InputSample::new(x, y, a, b))
    }

    #[test]
    fn test_load_config_fallbacks() {
        assert_eq!(load_config(&mut MemoryStore::default()), Config::default());

        let mut broken = MemoryStore {
            broken: true,
            ..MemoryStore::default()
        };
        assert_eq!(load_config(&mut broken), Config::default());

        let stored = Config {
            max_throttle: 0.8,
            accel_profile: AccelProfile::Soft,
            ..Config::default()
        };
        let mut store = MemoryStore {
            blob: Some(stored.encode().unwrap()),
            ..MemoryStore::default()
        };
        let loaded = load_config(&mut store);
        assert!(approx(loaded.max_throttle, 0.8));
        assert_eq!(loaded.accel_profile, AccelProfile::Soft);
    }

    #[test]
    fn test_tick_drives_esc() {
        let input = ScriptedInput::new([stick(0.0, 1.0, false, false); 3]);
        let mut ctl =
            ControlLoop::new(input, RecordingEsc::default(), MemoryStore::default(), Tuning::default())
                .unwrap();
        for t in 0..3 {
            ctl.tick(t * 20);
        }
        let levels: Vec<f32> = ctl.esc().writes.iter().map(|&(l, _)| l).collect();
        assert_eq!(levels.len(), 3);
        assert!(approx(levels[0], 0.05));
        assert!(approx(levels[1], 0.052));
        assert_eq!(ctl.esc().writes[2].1, 40);
    }

    #[test]
    fn test_lost_controller_resets_to_neutral() {
        let mut script = Vec::new();
        script.extend([stick(0.0, -1.0, false, false); 5]);
        script.extend([None, None]);
        script.push(stick(0.0, 0.0, false, false));
        let mut ctl = ControlLoop::new(
            ScriptedInput::new(script),
            RecordingEsc::default(),
            MemoryStore::default(),
            Tuning::default(),
        )
        .unwrap();

        for t in 0..5 {
            assert!(ctl.tick(t * 20) < 0.0);
        }
        assert_eq!(ctl.tick(100), 0.0);
        assert!(ctl.is_controller_lost());
        assert_eq!(ctl.engine().mode(), ThrottleMode::Coast);
        assert_eq!(ctl.tick(120), 0.0);

        assert_eq!(ctl.tick(140), 0.0);
        assert!(!ctl.is_controller_lost());
        assert_eq!(ctl.esc().writes.len(), 8);
    }

    #[test]
    fn test_commit_gesture_is_persisted() {
        let script = core::iter::repeat(stick(1.0, 0.0, true, false)).take(150);
        let mut ctl = ControlLoop::new(
            ScriptedInput::new(script),
            RecordingEsc::default(),
            MemoryStore::default(),
            Tuning::default(),
        )
        .unwrap();
        for t in 0..149 {
            ctl.tick(t * 20);
        }
        assert_eq!(ctl.store().saves, 0);
        ctl.tick(149 * 20);
        assert_eq!(ctl.store().saves, 1);
        assert!(ctl.store().blob.is_some());
    }

    #[test]
    fn test_esc_failure_does_not_stop_loop() {
        let esc = RecordingEsc {
            fail: true,
            ..RecordingEsc::default()
        };
        let input = ScriptedInput::new([stick(0.0, 1.0, false, false); 2]);
        let mut ctl = ControlLoop::new(input, esc, MemoryStore::default(), Tuning::default()).unwrap();
        ctl.tick(0);
        assert!(approx(ctl.tick(20), 0.052));
        ctl.esc_mut().fail = false;
        ctl.tick(40);
        assert_eq!(ctl.esc().writes.len(), 1);
    }

    #[test]
    fn test_reinitialize_stores_config() {
        let mut ctl = ControlLoop::new(
            ScriptedInput::new(Vec::new()),
            RecordingEsc::default(),
            MemoryStore::default(),
            Tuning::default(),
        )
        .unwrap();
        let config = Config {
            auto_cruise_level: 0.35,
            accel_profile: AccelProfile::Firm,
            ..Config::default()
        };
        ctl.reinitialize(config);
        assert_eq!(ctl.store().saves, 1);

        let mut reloaded = MemoryStore {
            blob: ctl.store().blob.clone(),
            ..MemoryStore::default()
        };
        let loaded = load_config(&mut reloaded);
        assert!(approx(loaded.auto_cruise_level, 0.35));
        assert_eq!(loaded.accel_profile, AccelProfile::Firm);
    }

    #[test]
    fn test_stored_heli_mode_selects_dead_man() {
        let stored = Config {
            auto_cruise_level: 0.3,
            heli_mode: true,
            ..Config::default()
        };
        let mut store = MemoryStore {
            blob: Some(stored.encode().unwrap()),
            ..MemoryStore::default()
        };
        let config = load_config(&mut store);
        assert_eq!(config.esc_mode(), crate::esc::EscMode::Heli);

        let input = ScriptedInput::new([stick(0.0, 0.0, false, true); 2]);
        let mut ctl =
            ControlLoop::with_config(input, RecordingEsc::default(), store, config, Tuning::default())
                .unwrap();
        assert!(approx(ctl.tick(0), 0.3));
        assert!(approx(ctl.tick(20), 0.3));
        assert_eq!(ctl.engine().mode(), ThrottleMode::DeadMan);
    }

    #[test]
    fn test_invalid_tuning_rejected() {
        let tuning = Tuning {
            deadzone: 0.0,
            ..Tuning::default()
        };
        assert!(ControlLoop::new(
            ScriptedInput::new(Vec::new()),
            RecordingEsc::default(),
            MemoryStore::default(),
            tuning
        )
        .is_err());
    }
}
