//! Configuration persistence in NVS
//!
//! The whole [`SystemConfig`] is stored as one versioned blob. A separate
//! `configured` flag marks whether a save ever happened, so clearing the
//! configuration is a single flag write and the next boot uses defaults.

use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use log::{info, warn};
use webgui_rs::store::{decode_config, encode_config, ConfigStore};
use webgui_rs::{StoreError, SystemConfig};

/// NVS namespace for device configuration
const NVS_NAMESPACE: &str = "webgui_cfg";

/// NVS keys
mod nvs_keys {
    pub const CONFIG: &str = "config";
    pub const CONFIGURED: &str = "configured";
}

/// Upper bound for the stored blob
const MAX_BLOB_LEN: usize = 2048;

/// [`ConfigStore`] backed by the default NVS partition
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    pub fn new(partition: EspNvsPartition<NvsDefault>) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl ConfigStore for NvsStore {
    fn load(&mut self) -> Result<Option<SystemConfig>, StoreError> {
        // Check if configuration has been saved before
        let configured = self
            .nvs
            .get_u8(nvs_keys::CONFIGURED)
            .map_err(backend)?
            .map(|v| v != 0)
            .unwrap_or(false);
        if !configured {
            return Ok(None);
        }

        let mut buf = vec![0u8; MAX_BLOB_LEN];
        match self.nvs.get_blob(nvs_keys::CONFIG, &mut buf).map_err(backend)? {
            Some(blob) => decode_config(blob).map(Some),
            None => {
                warn!("Configured flag set but no configuration blob stored");
                Ok(None)
            }
        }
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), StoreError> {
        let blob = encode_config(config)?;
        if blob.len() > MAX_BLOB_LEN {
            return Err(StoreError::Backend(format!(
                "configuration blob of {} bytes exceeds {} bytes",
                blob.len(),
                MAX_BLOB_LEN
            )));
        }
        self.nvs.set_blob(nvs_keys::CONFIG, &blob).map_err(backend)?;
        // Mark as configured
        self.nvs.set_u8(nvs_keys::CONFIGURED, 1).map_err(backend)?;
        info!("Configuration saved to NVS ({} bytes)", blob.len());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.nvs.set_u8(nvs_keys::CONFIGURED, 0).map_err(backend)?;
        info!("Configuration cleared - will use defaults on next boot");
        Ok(())
    }
}
