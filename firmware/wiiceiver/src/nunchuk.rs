use esp_idf_hal::delay::{FreeRtos, BLOCK};
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_sys::EspError;
use log::{info, warn};
use wiiceiver_core::input::{INIT_SEQUENCE, NUNCHUK_ADDR, REPORT_LEN};
use wiiceiver_core::{InputSample, InputSource, Nunchuk};

/// Time the nunchuk needs between the read request and the report.
const CONVERSION_DELAY_MS: u32 = 1;
/// Consecutive bus errors before the handshake is repeated.
const MAX_FAILED_READS: u8 = 10;

/// Wii nunchuk on I2C.
pub struct NunchukReader<'d> {
    i2c: I2cDriver<'d>,
    chuck: Nunchuk,
    failed_reads: u8,
}

impl<'d> NunchukReader<'d> {
    /// Set up the nunchuk, starting from a stored stick center if there is one.
    pub fn new(i2c: I2cDriver<'d>, center: Option<u8>) -> Result<Self, EspError> {
        let chuck = center.map(Nunchuk::with_center).unwrap_or_default();
        let mut reader = Self {
            i2c,
            chuck,
            failed_reads: 0,
        };
        reader.handshake()?;
        info!("nunchuk ready, center {}", reader.chuck.center());
        Ok(reader)
    }

    /// Switch the nunchuk to unencrypted reports.
    fn handshake(&mut self) -> Result<(), EspError> {
        for command in INIT_SEQUENCE {
            self.i2c.write(NUNCHUK_ADDR, &command, BLOCK)?;
            FreeRtos::delay_ms(CONVERSION_DELAY_MS);
        }
        Ok(())
    }

    fn read_report(&mut self) -> Result<[u8; REPORT_LEN], EspError> {
        self.i2c.write(NUNCHUK_ADDR, &[0x00], BLOCK)?;
        FreeRtos::delay_ms(CONVERSION_DELAY_MS);
        let mut report = [0u8; REPORT_LEN];
        self.i2c.read(NUNCHUK_ADDR, &mut report, BLOCK)?;
        Ok(report)
    }

    /// Take the current stick position as center and return it for storing.
    pub fn calibrate(&mut self) -> Result<u8, EspError> {
        let report = self.read_report()?;
        self.chuck.calibrate_center(&report);
        info!("stick center calibrated at {}", self.chuck.center());
        Ok(self.chuck.center())
    }
}

impl InputSource for NunchukReader<'_> {
    fn read(&mut self) -> Option<InputSample> {
        match self.read_report() {
            Ok(report) => {
                self.failed_reads = 0;
                let sample = self.chuck.decode(&report);
                self.chuck.is_active().then_some(sample)
            }
            Err(e) => {
                self.failed_reads = self.failed_reads.saturating_add(1);
                if self.failed_reads >= MAX_FAILED_READS {
                    warn!("nunchuk not responding ({:?}), re-initializing", e);
                    self.failed_reads = 0;
                    if let Err(e) = self.handshake() {
                        warn!("nunchuk handshake failed: {:?}", e);
                    }
                }
                None
            }
        }
    }
}
