mod esc;
mod nunchuk;
mod settings;

use esc::EscDriver;
use nunchuk::NunchukReader;
use settings::SettingsStore;
use wiiceiver_core::{load_config, ControlLoop, Millis, Tuning};

use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Control loop period.
const TICK_MS: u64 = 20;
/// Drive a second ESC from the same signal.
const DUAL_ESC: bool = false;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init().map_err(|e| anyhow::anyhow!("logger init failed: {:?}", e))?;

    info!("Wiiceiver v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let mut store = SettingsStore::new(nvs_partition)?;
    // heli mode decides how the ESC is driven, so settings come first
    let config = load_config(&mut store);

    // ESC first, so it sees a valid signal as early as possible
    let timer_config = TimerConfig::default()
        .frequency(esc::PWM_FREQ_HZ.Hz().into())
        .resolution(Resolution::Bits14);
    let timer = LedcTimerDriver::new(peripherals.ledc.timer0, &timer_config)?;
    let primary = LedcDriver::new(peripherals.ledc.channel0, &timer, peripherals.pins.gpio4)?;
    let secondary = if DUAL_ESC {
        Some(LedcDriver::new(
            peripherals.ledc.channel1,
            &timer,
            peripherals.pins.gpio7,
        )?)
    } else {
        None
    };
    let mut esc = EscDriver::new(primary, secondary, config.esc_mode());
    esc.arm()?;

    let i2c_config = I2cConfig::new().baudrate(100.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio5,
        peripherals.pins.gpio6,
        &i2c_config,
    )?;

    let center = store.stick_center().unwrap_or_else(|e| {
        warn!("could not read stick center: {:?}", e);
        None
    });
    let mut chuck = NunchukReader::new(i2c, center)?;
    if center.is_none() {
        // first boot: the stick is assumed to be at rest
        match chuck.calibrate() {
            Ok(center) => {
                if let Err(e) = store.save_stick_center(center) {
                    warn!("failed to store stick center: {:?}", e);
                }
            }
            Err(e) => warn!("stick calibration failed: {:?}", e),
        }
    }

    let mut control = ControlLoop::with_config(chuck, esc, store, config, Tuning::default())?;
    info!("running, {} ms ticks", TICK_MS);

    let boot = Instant::now();
    let period = Duration::from_millis(TICK_MS);
    loop {
        let started = Instant::now();
        control.tick(boot.elapsed().as_millis() as Millis);

        if let Some(rest) = period.checked_sub(started.elapsed()) {
            sleep(rest);
        }
    }
}
