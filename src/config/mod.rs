//! Configuration settings for the reservation calendar core.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lock: LockConfig,
    pub session: SessionConfig,
    pub recurrence: RecurrenceConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            // Current directory
            PathBuf::from("config.toml"),
            PathBuf::from("rota.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("rota/config.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".rota/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.lock.lease_minutes <= 0 {
            return Err(ConfigError::Invalid("lock.lease_minutes must be > 0".to_string()).into());
        }
        if self.lock.warn_minutes < 0 {
            return Err(ConfigError::Invalid("lock.warn_minutes must be >= 0".to_string()).into());
        }
        if self.session.confirmation_timeout_secs <= 0 {
            return Err(ConfigError::Invalid(
                "session.confirmation_timeout_secs must be > 0".to_string(),
            )
            .into());
        }
        if self.session.availability_buffer_minutes < 0 {
            return Err(ConfigError::Invalid(
                "session.availability_buffer_minutes must be >= 0".to_string(),
            )
            .into());
        }
        if self.recurrence.max_occurrences == 0 {
            return Err(
                ConfigError::Invalid("recurrence.max_occurrences must be > 0".to_string()).into(),
            );
        }
        Ok(())
    }
}

/// Review hold (soft advisory lock) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lease duration in minutes, set by the lock service at acquisition.
    pub lease_minutes: i64,
    /// Warn the reviewer when this many minutes remain on the lease.
    pub warn_minutes: i64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_minutes: 30,
            warn_minutes: 5,
        }
    }
}

/// Edit session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle window in which an armed confirmation stays valid.
    pub confirmation_timeout_secs: i64,
    /// Buffer applied around a booking when checking room availability.
    pub availability_buffer_minutes: i64,
    /// Allow approvals to override scheduling conflicts. Off by default;
    /// enabling it is an explicit policy decision.
    pub allow_force_approve: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: 120,
            availability_buffer_minutes: 15,
            allow_force_approve: false,
        }
    }
}

/// Recurrence expansion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceConfig {
    /// Maximum occurrences materialized when pre-resolving a series preview.
    pub max_occurrences: usize,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            max_occurrences: 366,
        }
    }
}
