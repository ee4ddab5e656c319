//! Configuration persistence
//!
//! The configuration is stored as one blob: a 4 byte magic, a little-endian
//! `u16` layout version and the `bincode` encoding of [`SystemConfig`]. The
//! storage mechanism itself (NVS, flash, a file) sits behind [`ConfigStore`].

use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::StoreError;

/// Blob magic
pub const CONFIG_MAGIC: [u8; 4] = *b"WGUI";

/// Layout version written by this build
pub const CONFIG_VERSION: u16 = 1;

const HEADER_LEN: usize = CONFIG_MAGIC.len() + 2;

/// Persistent storage for the device configuration
pub trait ConfigStore {
    /// Load the saved configuration, `None` when nothing was saved yet
    fn load(&mut self) -> Result<Option<SystemConfig>, StoreError>;

    /// Persist the configuration
    fn save(&mut self, config: &SystemConfig) -> Result<(), StoreError>;

    /// Forget the saved configuration; the next load returns `None`
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Encode a configuration into a storage blob
pub fn encode_config(config: &SystemConfig) -> Result<Vec<u8>, StoreError> {
    let body = bincode::serialize(config)?;
    let mut blob = Vec::with_capacity(HEADER_LEN + body.len());
    blob.extend_from_slice(&CONFIG_MAGIC);
    blob.extend_from_slice(&CONFIG_VERSION.to_le_bytes());
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Decode a storage blob written by [`encode_config`]
pub fn decode_config(blob: &[u8]) -> Result<SystemConfig, StoreError> {
    if blob.len() < HEADER_LEN || blob[..4] != CONFIG_MAGIC {
        return Err(StoreError::BadMagic);
    }
    let version = u16::from_le_bytes([blob[4], blob[5]]);
    if version != CONFIG_VERSION {
        return Err(StoreError::Version {
            found: version,
            expected: CONFIG_VERSION,
        });
    }
    Ok(bincode::deserialize(&blob[HEADER_LEN..])?)
}

/// Load from `store`, falling back to defaults when nothing usable is saved.
///
/// A corrupt or incompatible blob is logged and ignored; the device must still
/// come up so it can be reconfigured.
pub fn load_or_default<S: ConfigStore + ?Sized>(store: &mut S) -> SystemConfig {
    match store.load() {
        Ok(Some(config)) => {
            info!("Configuration loaded from storage");
            config
        }
        Ok(None) => {
            info!("No saved configuration found, using defaults");
            SystemConfig::default()
        }
        Err(e) => {
            warn!("Failed to load configuration, using defaults: {}", e);
            SystemConfig::default()
        }
    }
}

/// In-memory store, for tests and hosts without flash
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Option<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored blob
    pub fn blob(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }

    /// Replace the stored blob, bypassing the codec
    pub fn set_blob(&mut self, blob: Vec<u8>) {
        self.blob = Some(blob);
    }
}

impl ConfigStore for MemoryStore {
    fn load(&mut self) -> Result<Option<SystemConfig>, StoreError> {
        self.blob.as_deref().map(decode_config).transpose()
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), StoreError> {
        self.blob = Some(encode_config(config)?);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.blob = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::assign;
    use std::net::Ipv4Addr;

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        let mut config = SystemConfig::default();
        assign(&mut config.netname, "PUMP-7").unwrap();
        config.wifi.sta_ip = Ipv4Addr::new(10, 1, 2, 3);
        config.mqtt[1].port = 8883;
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap(), Some(config));
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new();
        store.save(&SystemConfig::default()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_blob_header() {
        let blob = encode_config(&SystemConfig::default()).unwrap();
        assert_eq!(&blob[..4], b"WGUI");
        assert_eq!(u16::from_le_bytes([blob[4], blob[5]]), CONFIG_VERSION);
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(decode_config(b"XXXX\x01\x00"), Err(StoreError::BadMagic)));
        assert!(matches!(decode_config(b"WG"), Err(StoreError::BadMagic)));
    }

    #[test]
    fn test_version_mismatch() {
        let mut blob = encode_config(&SystemConfig::default()).unwrap();
        blob[4] = 9;
        assert!(matches!(
            decode_config(&blob),
            Err(StoreError::Version { found: 9, expected: 1 })
        ));
    }

    #[test]
    fn test_truncated_body() {
        let blob = encode_config(&SystemConfig::default()).unwrap();
        assert!(matches!(decode_config(&blob[..HEADER_LEN + 3]), Err(StoreError::Codec(_))));
    }

    #[test]
    fn test_load_or_default_ignores_corrupt_blob() {
        let mut store = MemoryStore::new();
        store.set_blob(b"garbage".to_vec());
        assert_eq!(load_or_default(&mut store), SystemConfig::default());
    }
}
