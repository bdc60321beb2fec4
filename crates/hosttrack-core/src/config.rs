//! Configuration for the host cache.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $HOSTTRACK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/hosttrack/config.toml
//!   3. ~/.config/hosttrack/config.toml

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostTrackConfig {
    pub cache: CacheConfig,
    pub protocols: ProtocolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of hosts kept. Must be non-zero.
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Distinct protocol names the registry will assign ids to.
    pub max_references: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_references: 4096,
        }
    }
}

impl CacheConfig {
    /// The configured capacity, rejected if zero.
    pub fn capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.capacity).ok_or(ConfigError::InvalidCapacity(self.capacity))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("hosttrack")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("cache capacity must be non-zero, got {0}")]
    InvalidCapacity(usize),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl HostTrackConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Read one file, falling back to defaults if it does not exist.
    /// Env overrides are not applied.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("HOSTTRACK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_at(&path)?;
        Ok(path)
    }

    /// Write the default config to `path` unless something is already there.
    pub fn write_default_at(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&HostTrackConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.capacity().map(|_| ())
    }

    /// Apply HOSTTRACK_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("HOSTTRACK_CACHE__CAPACITY") {
            if let Ok(n) = v.parse() {
                self.cache.capacity = n;
            }
        }
        if let Ok(v) = std::env::var("HOSTTRACK_PROTOCOLS__MAX_REFERENCES") {
            if let Ok(n) = v.parse() {
                self.protocols.max_references = n;
            }
        }
    }
}
