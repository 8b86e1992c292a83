use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_sys::EspError;
use log::info;
use wiiceiver_core::{Config, ConfigStore};

const NVS_NAMESPACE: &str = "wiiceiver";
const KEY_SETTINGS: &str = "settings";
const KEY_STICK_CENTER: &str = "chuck_y0";
/// Upper bound on the encoded settings record.
const RECORD_MAX: usize = 32;

/// Rider settings and stick calibration in NVS.
pub struct SettingsStore {
    nvs: EspNvs<NvsDefault>,
}

impl SettingsStore {
    pub fn new(nvs_partition: EspNvsPartition<NvsDefault>) -> Result<Self, EspError> {
        let nvs = EspNvs::new(nvs_partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }

    /// Stored nunchuk Y center, if calibrated before.
    pub fn stick_center(&self) -> Result<Option<u8>, EspError> {
        let mut buf = [0u8; 1];
        match self.nvs.get_raw(KEY_STICK_CENTER, &mut buf) {
            Ok(Some(val)) => Ok(val.first().copied()),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save_stick_center(&mut self, center: u8) -> Result<(), EspError> {
        self.nvs.set_raw(KEY_STICK_CENTER, &[center])?;
        Ok(())
    }
}

impl ConfigStore for SettingsStore {
    type Error = anyhow::Error;

    fn load(&mut self) -> anyhow::Result<Option<Config>> {
        let mut buf = [0u8; RECORD_MAX];
        match self.nvs.get_raw(KEY_SETTINGS, &mut buf)? {
            Some(bytes) => Ok(Some(Config::decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, config: &Config) -> anyhow::Result<()> {
        let bytes = config.encode()?;
        self.nvs.set_raw(KEY_SETTINGS, &bytes)?;
        info!("stored {} byte settings record", bytes.len());
        Ok(())
    }
}
