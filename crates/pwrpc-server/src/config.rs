//! Daemon Configuration
//!
//! Settings are read from a TOML file using the host process's historical
//! key names (`Port`, `MaxClients`, `JsonrpcCacheExpirationTime`,
//! `DataDir`). Ranges are validated after deserialization; violations are
//! startup errors, never silently clamped.

use pwrpc_common::protocol::{PwrpcError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default client cap
pub const DEFAULT_MAX_CLIENTS: u32 = 16;
/// Default snapshot expiration in seconds
pub const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen port, 1..=65535
    #[serde(rename = "Port")]
    pub port: u16,

    /// Client cap for admission, 1..=65535
    #[serde(rename = "MaxClients", default = "default_max_clients")]
    pub max_clients: u32,

    /// Snapshot expiration in seconds, 1..=3600
    #[serde(
        rename = "JsonrpcCacheExpirationTime",
        default = "default_cache_expiration"
    )]
    pub cache_expiration_secs: u64,

    /// Root of the on-disk data hierarchy; empty means `.`
    #[serde(rename = "DataDir", default)]
    pub data_dir: PathBuf,
}

fn default_max_clients() -> u32 {
    DEFAULT_MAX_CLIENTS
}

fn default_cache_expiration() -> u64 {
    DEFAULT_CACHE_EXPIRATION_SECS
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| PwrpcError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(PwrpcError::Config(
                "Port should be between 1 and 65535".into(),
            ));
        }
        if self.max_clients < 1 || self.max_clients > 65535 {
            return Err(PwrpcError::Config(format!(
                "MaxClients '{}' should be between 1 and 65535",
                self.max_clients
            )));
        }
        if self.cache_expiration_secs < 1 || self.cache_expiration_secs > 3600 {
            return Err(PwrpcError::Config(format!(
                "JsonrpcCacheExpirationTime '{}' should be between 1 and 3600 seconds",
                self.cache_expiration_secs
            )));
        }
        Ok(())
    }

    /// The effective data directory: an unset or empty `DataDir` means the
    /// current directory.
    pub fn effective_data_dir(&self) -> PathBuf {
        if self.data_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            self.data_dir.clone()
        }
    }
}
