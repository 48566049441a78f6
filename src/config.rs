//! Runtime configuration.
//!
//! Read from an optional TOML file. Every field has a default, so an empty
//! or absent file yields a usable configuration.

use crate::error::{PharmacyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the CSV collections.
    pub data_dir: PathBuf,
    /// File holding the signing key.
    pub key_path: PathBuf,
    /// Address `serve` listens on.
    pub listen_addr: String,
    /// How far ahead the expiry report looks.
    pub expiry_warning_days: u32,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            key_path: PathBuf::from("data/signing.key"),
            listen_addr: "127.0.0.1:8080".to_string(),
            expiry_warning_days: 30,
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            PharmacyError::ValidationError(format!("invalid config {}: {e}", path.display()))
        })
    }
}
