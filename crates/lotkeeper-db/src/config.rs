//! # Engine Configuration
//!
//! Configuration for the inventory engine and its database.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LOTKEEPER_DB_PATH=/var/lib/lotkeeper/lotkeeper.db                  │
//! │     LOTKEEPER_LOCK_TIMEOUT_MS=2000                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/lotkeeper/lotkeeper.toml (Linux)                         │
//! │     ~/Library/Application Support/com.lotkeeper.engine/... (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "lotkeeper.db"
//! max_connections = 5
//! min_connections = 1
//! connect_timeout_secs = 30
//! lock_timeout_ms = 5000
//!
//! [consumption]
//! location_fallback = true
//!
//! [reconciliation]
//! shortage_costing = "average_cost"   # average_cost | fifo_lot
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Shortage Costing
// =============================================================================

/// Cost basis for reconciliation shortages.
///
/// ```text
/// AverageCost  the line's snapshot average is written to the ledger;
///              the ledger drifts from lot value by the difference
///              between the average and the consumed lots' costs
/// FifoLot      each consumed lot's own cost is written instead;
///              lot value and ledger value always agree
/// ```
///
/// Consumption records keep the lot cost in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortageCosting {
    #[default]
    AverageCost,
    FifoLot,
}

impl std::fmt::Display for ShortageCosting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShortageCosting::FifoLot => write!(f, "fifo_lot"),
            ShortageCosting::AverageCost => write!(f, "average_cost"),
        }
    }
}

impl std::str::FromStr for ShortageCosting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifo_lot" | "fifo" => Ok(ShortageCosting::FifoLot),
            "average_cost" | "average" | "avg" => Ok(ShortageCosting::AverageCost),
            other => Err(ConfigError::Invalid(format!(
                "Unknown shortage costing: '{}'. Valid options: fifo_lot, average_cost",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; relative paths resolve against the working directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long a transaction waits for the write lock before failing
    /// with `ConcurrencyTimeout`.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("lotkeeper.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_lock_timeout() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}

/// `[consumption]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionSettings {
    /// Retry unscoped when the requested location cannot cover a request.
    #[serde(default = "default_true")]
    pub location_fallback: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ConsumptionSettings {
    fn default() -> Self {
        ConsumptionSettings {
            location_fallback: true,
        }
    }
}

/// `[reconciliation]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    #[serde(default)]
    pub shortage_costing: ShortageCosting,
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub consumption: ConsumptionSettings,

    #[serde(default)]
    pub reconciliation: ReconciliationSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (lotkeeper.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML string, then applies validation (no environment).
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let db = &self.database;

        if db.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if db.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if db.min_connections > db.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }

        if db.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.lock_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("LOTKEEPER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("LOTKEEPER_DB_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse::<u32>() {
                self.database.max_connections = n;
            }
        }

        if let Ok(timeout) = std::env::var("LOTKEEPER_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                debug!(lock_timeout_ms = ms, "Overriding lock timeout from environment");
                self.database.lock_timeout_ms = ms;
            }
        }

        if let Ok(fallback) = std::env::var("LOTKEEPER_LOCATION_FALLBACK") {
            match fallback.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.consumption.location_fallback = true,
                "0" | "false" | "no" | "off" => self.consumption.location_fallback = false,
                _ => warn!(value = %fallback, "Unknown LOTKEEPER_LOCATION_FALLBACK value"),
            }
        }

        if let Ok(costing) = std::env::var("LOTKEEPER_SHORTAGE_COSTING") {
            match costing.parse() {
                Ok(parsed) => self.reconciliation.shortage_costing = parsed,
                Err(e) => warn!(error = %e, "Ignoring LOTKEEPER_SHORTAGE_COSTING"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "lotkeeper", "engine")
            .map(|dirs| dirs.config_dir().join("lotkeeper.toml"))
    }

    /// Builds the database configuration these settings describe.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .lock_timeout(Duration::from_millis(self.database.lock_timeout_ms))
            .location_fallback(self.consumption.location_fallback)
            .shortage_costing(self.reconciliation.shortage_costing)
    }
}
