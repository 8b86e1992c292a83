use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::ledc::LedcDriver;
use esp_idf_sys::EspError;
use log::info;
use wiiceiver_core::esc::{angle_to_pulse_us, arming_sequence, pulse_to_duty};
use wiiceiver_core::{EscMode, EscOutput, EscSignal, Millis};

/// Hobby ESC PWM frequency.
pub const PWM_FREQ_HZ: u32 = 50;

/// One or two ESCs driven with the same servo pulse over LEDC.
pub struct EscDriver<'d> {
    channels: Vec<LedcDriver<'d>>,
    max_duty: u32,
    signal: EscSignal,
}

impl<'d> EscDriver<'d> {
    pub fn new(primary: LedcDriver<'d>, secondary: Option<LedcDriver<'d>>, mode: EscMode) -> Self {
        let max_duty = primary.get_max_duty();
        let mut channels = vec![primary];
        channels.extend(secondary);
        info!("esc: {} channel(s), max duty {}", channels.len(), max_duty);
        Self {
            channels,
            max_duty,
            signal: EscSignal::new(mode),
        }
    }

    /// Run the ESC arming sequence. Blocks for the whole sequence.
    pub fn arm(&mut self) -> Result<(), EspError> {
        info!("arming esc");
        for (level, hold_ms) in arming_sequence() {
            let pulse = angle_to_pulse_us(self.signal.mode().angle(level));
            self.set_pulse(pulse)?;
            FreeRtos::delay_ms(hold_ms as u32);
        }
        self.signal.forget();
        Ok(())
    }

    fn set_pulse(&mut self, pulse_us: u32) -> Result<(), EspError> {
        let duty = pulse_to_duty(pulse_us, self.max_duty);
        for channel in &mut self.channels {
            channel.set_duty(duty)?;
        }
        Ok(())
    }
}

impl EscOutput for EscDriver<'_> {
    type Error = EspError;

    fn apply_command(&mut self, level: f32, now: Millis) -> Result<(), Self::Error> {
        match self.signal.pulse_for(level, now) {
            Some(pulse) => self.set_pulse(pulse),
            None => Ok(()),
        }
    }
}
