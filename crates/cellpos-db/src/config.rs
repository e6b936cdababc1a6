//! # Application Configuration
//!
//! Where the database lives and how the pool is sized. Business settings
//! (tax rate, thresholds) stay in the `settings` table.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CELLPOS_DB_PATH, CELLPOS_MAX_CONNECTIONS,                          │
//! │     CELLPOS_SEED_SAMPLE_DATA, CELLPOS_SHOP_NAME                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cellpos/cellpos.toml (Linux)                             │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     database in the platform data dir, 4 connections                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/home/user/.local/share/cellpos/cellpos.db"
//! max_connections = 4
//! busy_timeout_secs = 30
//! seed_sample_data = true
//!
//! [shop]
//! name = "Mobile Shop"
//! currency = "EGP"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::{DbConfig, DEFAULT_CURRENCY, DEFAULT_SHOP_NAME};

/// Config file name inside the platform config dir.
pub const CONFIG_FILE_NAME: &str = "cellpos.toml";

/// Database file name inside the platform data dir.
pub const DATABASE_FILE_NAME: &str = "cellpos.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
    pub seed_sample_data: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: 4,
            busy_timeout_secs: 30,
            seed_sample_data: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopSettings {
    pub name: String,
    pub currency: String,
}

impl Default for ShopSettings {
    fn default() -> Self {
        ShopSettings {
            name: DEFAULT_SHOP_NAME.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub shop: ShopSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`cellpos.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = match config_path.or_else(Self::default_config_path) {
            Some(path) if path.exists() => {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    DbError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml(&contents)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads config or returns the default if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(format!("invalid config: {e}")))
    }

    /// Saves configuration, creating the parent directory if needed.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbError::Config(format!("cannot create {}: {e}", parent.display())))?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| DbError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(&path, contents)
            .map_err(|e| DbError::Config(format!("cannot write {}: {e}", path.display())))?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.database.busy_timeout_secs == 0 {
            return Err(DbError::Config(
                "database.busy_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Builds the pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
            .seed_sample_data(self.database.seed_sample_data)
            .shop(&self.shop.name, &self.shop.currency)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `CELLPOS_*` overrides from `lookup`. Unparsable values are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("CELLPOS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("CELLPOS_MAX_CONNECTIONS") {
            match max.trim().parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid CELLPOS_MAX_CONNECTIONS"),
            }
        }

        if let Some(seed) = lookup("CELLPOS_SEED_SAMPLE_DATA") {
            match seed.trim().to_lowercase().as_str() {
                "1" | "true" => self.database.seed_sample_data = true,
                "0" | "false" => self.database.seed_sample_data = false,
                _ => warn!(value = %seed, "Ignoring invalid CELLPOS_SEED_SAMPLE_DATA"),
            }
        }

        if let Some(name) = lookup("CELLPOS_SHOP_NAME") {
            self.shop.name = name;
        }
    }

    /// `<config dir>/cellpos.toml`, when the platform has a home directory.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "cellpos", "shop")
}

/// `<data dir>/cellpos.db`, or `cellpos.db` in the working directory.
pub fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
}
