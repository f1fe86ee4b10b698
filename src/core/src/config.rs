//! User configuration loaded from `~/.a3s/index.yaml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "A3S_INDEX_CONFIG";

/// Index tool configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Default log level (overridden by `RUST_LOG`)
    pub log_level: LogLevel,

    /// Remote registry settings
    pub registry: RegistryConfig,
}

impl IndexConfig {
    /// Default config path (`~/.a3s/index.yaml`).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".a3s"))
            .unwrap_or_else(|| PathBuf::from(".a3s"))
            .join("index.yaml")
    }

    /// Load from `$A3S_INDEX_CONFIG`, falling back to the default path.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        Self::from_path(&path)
    }

    /// Load from a YAML file. A missing file yields the defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            IndexError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }
}

/// Registry transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Use plain HTTP for every registry
    pub plain_http: bool,

    /// Registries reached over plain HTTP even when `plain_http` is off
    pub insecure_registries: Vec<String>,

    /// Env var holding the registry username
    pub username_env: String,

    /// Env var holding the registry password
    pub password_env: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            plain_http: false,
            insecure_registries: Vec::new(),
            username_env: "REGISTRY_USERNAME".to_string(),
            password_env: "REGISTRY_PASSWORD".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Whether `registry` should be contacted over plain HTTP.
    pub fn is_plain_http(&self, registry: &str) -> bool {
        self.plain_http || self.insecure_registries.iter().any(|r| r == registry)
    }

    /// Basic credentials from the configured env vars, if both are set.
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = std::env::var(&self.username_env).ok()?;
        let password = std::env::var(&self.password_env).ok()?;
        Some((username, password))
    }
}

/// Log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
