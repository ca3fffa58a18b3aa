//! # Configuration
//!
//! Runtime settings for the database and the engine services.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ATELIER_DATABASE_PATH=/var/lib/atelier/atelier.db                  │
//! │     ATELIER_UTC_OFFSET_MINUTES=-180                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/atelier/atelier.toml (Linux)                             │
//! │     ~/Library/Application Support/com.atelier.admin/atelier.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "atelier.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [engine]
//! operation_timeout_ms = 5000
//!
//! [schedule]
//! utc_offset_minutes = -180   # business day boundaries (São Paulo)
//!
//! [inventory]
//! fifo_batch_consumption = false
//! ```

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use atelier_core::interval::{business_day, offset_from_minutes};

use crate::error::{ConfigError, ConfigResult};
use crate::pool::DbConfig;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for SQLite's lock before failing.
    #[serde(default = "default_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("atelier.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Upper bound for one booking or cascade, transaction included.
    #[serde(default = "default_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        EngineSection {
            operation_timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSection {
    /// Minutes east of UTC used to compute business days.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySection {
    /// Draw product batches FIFO on stock exits and product sales.
    #[serde(default)]
    pub fifo_batch_consumption: bool,
}

// =============================================================================
// AtelierConfig
// =============================================================================

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtelierConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub schedule: ScheduleSection,

    #[serde(default)]
    pub inventory: InventorySection,
}

impl AtelierConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (atelier.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.engine.operation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.operation_timeout_ms must be greater than 0".into(),
            ));
        }
        // FixedOffset accepts strictly less than ±24h.
        if offset_from_minutes(self.schedule.utc_offset_minutes).is_none() {
            return Err(ConfigError::Invalid(format!(
                "schedule.utc_offset_minutes out of range: {}",
                self.schedule.utc_offset_minutes
            )));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("ATELIER_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("ATELIER_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid ATELIER_MAX_CONNECTIONS"),
            }
        }

        if let Ok(ms) = std::env::var("ATELIER_BUSY_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.database.busy_timeout_ms = ms;
            }
        }

        if let Ok(ms) = std::env::var("ATELIER_OPERATION_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.engine.operation_timeout_ms = ms;
            }
        }

        if let Ok(offset) = std::env::var("ATELIER_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(m) => {
                    debug!(minutes = m, "Overriding business UTC offset from environment");
                    self.schedule.utc_offset_minutes = m;
                }
                Err(_) => warn!(value = %offset, "Ignoring invalid ATELIER_UTC_OFFSET_MINUTES"),
            }
        }

        if let Ok(flag) = std::env::var("ATELIER_FIFO_BATCH_CONSUMPTION") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.inventory.fifo_batch_consumption = true,
                "0" | "false" | "no" => self.inventory.fifo_batch_consumption = false,
                _ => warn!(value = %flag, "Unknown ATELIER_FIFO_BATCH_CONSUMPTION value"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "atelier", "admin")
            .map(|dirs| dirs.config_dir().join("atelier.toml"))
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// Settings handed to the services.
    pub fn engine_settings(&self) -> ConfigResult<EngineSettings> {
        let offset = offset_from_minutes(self.schedule.utc_offset_minutes).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "schedule.utc_offset_minutes out of range: {}",
                self.schedule.utc_offset_minutes
            ))
        })?;

        Ok(EngineSettings {
            operation_timeout: Duration::from_millis(self.engine.operation_timeout_ms),
            business_offset: offset,
            fifo_batch_consumption: self.inventory.fifo_batch_consumption,
        })
    }
}

// =============================================================================
// EngineSettings
// =============================================================================

/// Resolved settings used by the services at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub operation_timeout: Duration,
    pub business_offset: FixedOffset,
    pub fifo_batch_consumption: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            operation_timeout: Duration::from_millis(default_timeout_ms()),
            business_offset: Utc.fix(),
            fifo_batch_consumption: false,
        }
    }
}

impl EngineSettings {
    /// Today's business date.
    pub fn today(&self) -> NaiveDate {
        business_day(Utc::now(), self.business_offset)
    }

    pub fn with_fifo(mut self, enabled: bool) -> Self {
        self.fifo_batch_consumption = enabled;
        self
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.business_offset = offset;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}
