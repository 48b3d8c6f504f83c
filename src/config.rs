//! Application configuration loaded from a TOML file.
//!
//! The file lives at `~/.config/swapstation/config.toml` by default and
//! can be overridden with the `SWAPSTATION_CONFIG` environment variable.
//! Missing file or missing keys fall back to defaults, so a bare binary
//! still starts with the sandbox gateway credentials.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::infrastructure::gateway::vnpay::VnPayConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("swapstation")
        .join("config.toml")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
    pub expire_minutes: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let defaults = VnPayConfig::default();
        Self {
            tmn_code: defaults.tmn_code,
            hash_secret: defaults.hash_secret,
            pay_url: defaults.pay_url,
            return_url: defaults.return_url,
            expire_minutes: defaults.expire_minutes,
        }
    }
}

impl GatewayConfig {
    pub fn to_vnpay(&self) -> VnPayConfig {
        VnPayConfig {
            tmn_code: self.tmn_code.clone(),
            hash_secret: self.hash_secret.clone(),
            pay_url: self.pay_url.clone(),
            return_url: self.return_url.clone(),
            expire_minutes: self.expire_minutes,
            ..VnPayConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Seconds between sweep passes
    pub interval_secs: u64,
    /// Minutes a parked swap waits before auto-cancellation
    pub retry_timeout_minutes: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            retry_timeout_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub sweeper: SweeperConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}
