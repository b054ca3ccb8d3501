//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] so operator changes (closing duration,
//! recalibration) survive a restart.  The config is stored as one postcard
//! blob under a single key.
//!
//! - **`espidf` feature**: `EspNvs` on the default NVS partition.  Commits
//!   are atomic per `set_blob`.
//! - **host**: an in-memory map, for simulation and tests.

use log::info;
#[cfg(feature = "espidf")]
use log::warn;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;
use crate::error::Error;

#[cfg(not(feature = "espidf"))]
use std::collections::HashMap;

#[cfg(feature = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "burnie";
const CONFIG_KEY: &str = "syscfg";

#[cfg_attr(not(feature = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(feature = "espidf"))]
    store: HashMap<String, Vec<u8>>,
    #[cfg(feature = "espidf")]
    nvs: EspNvs<NvsDefault>,
}

impl NvsAdapter {
    /// Open the config namespace.
    #[cfg(feature = "espidf")]
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            warn!("NVS: cannot open namespace {}: {}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: ESP-IDF NVS namespace {} open", CONFIG_NAMESPACE);
        Ok(Self { nvs })
    }

    /// In-memory backend.
    #[cfg(not(feature = "espidf"))]
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsAdapter: simulation backend");
        Ok(Self { store: HashMap::new() })
    }

    #[cfg(not(feature = "espidf"))]
    fn composite_key(key: &str) -> String {
        format!("{}::{}", CONFIG_NAMESPACE, key)
    }

    #[cfg(not(feature = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.store.get(&Self::composite_key(CONFIG_KEY)).cloned())
    }

    #[cfg(feature = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let mut buf = vec![0u8; MAX_BLOB_SIZE];
        let blob = self.nvs.get_blob(CONFIG_KEY, &mut buf).map_err(|e| {
            warn!("NVS: read {} failed: {}", CONFIG_KEY, e);
            ConfigError::IoError
        })?;
        Ok(blob.map(<[u8]>::to_vec))
    }

    #[cfg(not(feature = "espidf"))]
    fn write_blob(&mut self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        self.store.insert(Self::composite_key(CONFIG_KEY), bytes);
        Ok(())
    }

    #[cfg(feature = "espidf")]
    fn write_blob(&mut self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        self.nvs.set_blob(CONFIG_KEY, &bytes).map_err(|e| {
            warn!("NVS: write {} failed: {}", CONFIG_KEY, e);
            ConfigError::IoError
        })?;
        Ok(())
    }
}

fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    match cfg.validate() {
        Ok(()) => Ok(()),
        Err(Error::Config(msg)) => Err(ConfigError::ValidationFailed(msg)),
        Err(_) => Err(ConfigError::ValidationFailed("invalid config")),
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(SystemConfig::default());
        };
        let cfg = SystemConfig::from_blob(&bytes).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("NvsAdapter: loaded config from store");
        Ok(cfg)
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = config.to_blob().map_err(|_| ConfigError::Corrupted)?;
        self.write_blob(bytes)?;
        info!("NvsAdapter: config saved");
        Ok(())
    }
}
