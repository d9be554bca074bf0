//! # Register Configuration
//!
//! ## Load Order (later overrides earlier)
//! 1. Defaults (this file)
//! 2. Config file (`pos.toml`)
//! 3. Environment variables (`MINIMART_*`)
//!
//! ## Example pos.toml
//! ```toml
//! [database]
//! path = "/var/lib/minimart/minimart.db"
//! max_connections = 5
//!
//! [register]
//! register_number = 2
//! store_name = "Minimart Derb Sultan"
//!
//! [logging]
//! filter = "info,minimart=debug,sqlx=warn"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PosError, PosResult};
use crate::telemetry::DEFAULT_LOG_FILTER;
use minimart_db::DbConfig;

const CONFIG_FILE: &str = "pos.toml";
const DATABASE_FILE: &str = "minimart.db";
const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub register: RegisterSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file. `None` uses the platform data directory;
    /// `":memory:"` opens a throwaway database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    pub max_connections: u32,

    pub min_connections: u32,

    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterSettings {
    /// Till number, embedded in every sale number.
    pub register_number: i64,

    pub store_name: String,
}

impl Default for RegisterSettings {
    fn default() -> Self {
        RegisterSettings {
            register_number: 1,
            store_name: "Minimart".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> PosResult<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    fn load_with(
        config_path: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> PosResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading register config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| PosError::ConfigLoadFailed(format!("{}: {e}", path.display())))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(lookup);
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load register config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> PosResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| PosError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PosError::ConfigSaveFailed(format!("{}: {e}", parent.display())))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| PosError::ConfigSaveFailed(format!("{}: {e}", path.display())))?;

        info!(?path, "Register config saved");
        Ok(())
    }

    pub fn validate(&self) -> PosResult<()> {
        if self.register.register_number <= 0 {
            return Err(PosError::InvalidConfig(format!(
                "register_number must be greater than 0, got {}",
                self.register.register_number
            )));
        }

        if self.database.max_connections == 0 {
            return Err(PosError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(PosError::InvalidConfig(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        Ok(())
    }

    /// Applies `MINIMART_*` overrides from any key lookup.
    ///
    /// Unparseable numbers are ignored with a warning.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("MINIMART_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup("MINIMART_DB_MAX_CONNECTIONS") {
            match value.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %value, "Ignoring invalid MINIMART_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("MINIMART_REGISTER_NUMBER") {
            match value.parse::<i64>() {
                Ok(number) => {
                    debug!(register_number = number, "Overriding register number from environment");
                    self.register.register_number = number;
                }
                Err(_) => warn!(value = %value, "Ignoring invalid MINIMART_REGISTER_NUMBER"),
            }
        }

        if let Some(filter) = lookup("MINIMART_LOG_FILTER") {
            self.logging.filter = filter;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Resolves the database file, creating its directory when needed.
    ///
    /// ## Platform-Specific Paths
    /// - **Linux**: `~/.local/share/pos/minimart.db`
    /// - **macOS**: `~/Library/Application Support/com.minimart.pos/minimart.db`
    /// - **Windows**: `%APPDATA%\minimart\pos\data\minimart.db`
    pub fn database_path(&self) -> PosResult<PathBuf> {
        let path = match &self.database.path {
            Some(path) => path.clone(),
            None => project_dirs()
                .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
                .unwrap_or_else(|| PathBuf::from(DATABASE_FILE)),
        };

        if !is_in_memory(&path) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PosError::InvalidConfig(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        Ok(path)
    }

    /// Pool settings for the ledger store.
    pub fn db_config(&self) -> PosResult<DbConfig> {
        let path = self.database_path()?;
        if is_in_memory(&path) {
            return Ok(DbConfig::in_memory());
        }

        Ok(DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs)))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "minimart", "pos")
}

fn is_in_memory(path: &Path) -> bool {
    path.as_os_str() == IN_MEMORY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = PosConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.register.register_number, 1);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: PosConfig = toml::from_str(
            r#"
            [register]
            register_number = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.register.register_number, 3);
        assert_eq!(config.register.store_name, "Minimart");
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MINIMART_DB_PATH", ":memory:"),
            ("MINIMART_DB_MAX_CONNECTIONS", "not-a-number"),
            ("MINIMART_REGISTER_NUMBER", "4"),
            ("MINIMART_LOG_FILTER", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = PosConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, Some(PathBuf::from(":memory:")));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.register.register_number, 4);
        assert_eq!(config.logging.filter, "warn");
        assert!(config.db_config().unwrap().is_in_memory());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PosConfig::default();
        config.register.register_number = 0;
        assert!(matches!(config.validate(), Err(PosError::InvalidConfig(_))));

        let mut config = PosConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("minimart-config-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);

        let mut config = PosConfig::default();
        config.register.register_number = 7;
        config.database.path = Some(dir.join(DATABASE_FILE));
        config.save(Some(path.clone())).unwrap();

        let loaded = PosConfig::load_with(Some(path.clone()), |_| None).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_applies_file_then_env_then_validates() {
        let dir = std::env::temp_dir().join(format!("minimart-layers-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            &path,
            r#"
            [register]
            register_number = 2
            store_name = "Hanout Atlas"

            [logging]
            filter = "debug"
            "#,
        )
        .unwrap();

        let vars: HashMap<&str, &str> = [("MINIMART_LOG_FILTER", "warn")].into_iter().collect();
        let loaded =
            PosConfig::load_with(Some(path.clone()), |key| vars.get(key).map(|v| v.to_string()))
                .unwrap();
        assert_eq!(loaded.register.register_number, 2);
        assert_eq!(loaded.register.store_name, "Hanout Atlas");
        assert_eq!(loaded.logging.filter, "warn");

        // An override that breaks validation fails the whole load
        let err = PosConfig::load_with(Some(path.clone()), |key| {
            (key == "MINIMART_REGISTER_NUMBER").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, PosError::InvalidConfig(_)));

        std::fs::write(&path, "[register]\nregister_number = \"two\"\n").unwrap();
        assert!(PosConfig::load_with(Some(path.clone()), |_| None).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
