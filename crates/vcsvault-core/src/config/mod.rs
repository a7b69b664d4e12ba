//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::security::MasterKeyRepository;
use crate::infrastructure::security::{
    EnvMasterKeyRepository, KEYRING_SERVICE, KEYRING_USER, KeyringMasterKeyRepository,
    MASTER_KEY_ENV,
};
use crate::storage::{DatabaseConfig, default_database_path};
use crate::storage::database::DEFAULT_MAX_CONNECTIONS;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "VCSVAULT_CONFIG_DIR";

/// vcsvault configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub security: SecuritySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file; the platform data directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritySettings {
    pub master_key_source: MasterKeySource,
    pub keyring_service: String,
    pub keyring_user: String,
    /// Variable read when `master_key_source` is `env`
    pub master_key_env: String,
}

/// Where the master key is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterKeySource {
    /// OS keyring
    #[default]
    Keyring,
    /// Hex-encoded environment variable, read-only
    Env,
}

impl MasterKeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyring => "keyring",
            Self::Env => "env",
        }
    }
}

impl FromStr for MasterKeySource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "env" => Ok(Self::Env),
            other => Err(anyhow!(
                "Invalid master key source: {}. Valid options: keyring, env",
                other
            )),
        }
    }
}

impl fmt::Display for MasterKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            master_key_source: MasterKeySource::Keyring,
            keyring_service: KEYRING_SERVICE.to_string(),
            keyring_user: KEYRING_USER.to_string(),
            master_key_env: MASTER_KEY_ENV.to_string(),
        }
    }
}

const KEYS: [&str; 6] = [
    "database.path",
    "database.max_connections",
    "security.master_key_source",
    "security.keyring_service",
    "security.keyring_user",
    "security.master_key_env",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("vcsvault")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create config directory: {}", dir.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be at least 1"));
        }
        if self.security.keyring_service.trim().is_empty()
            || self.security.keyring_user.trim().is_empty()
        {
            return Err(anyhow!("Keyring service and user must not be empty"));
        }
        if self.security.master_key_env.trim().is_empty() {
            return Err(anyhow!("security.master_key_env must not be empty"));
        }
        Ok(())
    }

    /// The database file in effect
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Database settings for opening the pool
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::with_path(self.database_path())
            .max_connections(self.database.max_connections)
    }

    /// Build the master key repository selected by `security.master_key_source`
    pub fn master_key_repository(&self) -> Box<dyn MasterKeyRepository> {
        match self.security.master_key_source {
            MasterKeySource::Keyring => Box::new(KeyringMasterKeyRepository::with_names(
                &self.security.keyring_service,
                &self.security.keyring_user,
            )),
            MasterKeySource::Env => {
                Box::new(EnvMasterKeyRepository::new(&self.security.master_key_env))
            }
        }
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "database.path" => Ok(self.database_path().display().to_string()),
            "database.max_connections" => Ok(self.database.max_connections.to_string()),

            "security.master_key_source" => Ok(self.security.master_key_source.to_string()),
            "security.keyring_service" => Ok(self.security.keyring_service.clone()),
            "security.keyring_user" => Ok(self.security.keyring_user.clone()),
            "security.master_key_env" => Ok(self.security.master_key_env.clone()),

            "security.master_key" => Err(anyhow!(
                "The master key is never stored in configuration. Use `vcsvault key init`."
            )),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `vcsvault config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "database.path" => {
                self.database.path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "database.max_connections" => {
                let max: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_connections value: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("max_connections must be at least 1"));
                }
                self.database.max_connections = max;
            }

            "security.master_key_source" => {
                self.security.master_key_source = value.parse()?;
            }
            "security.keyring_service" => {
                self.security.keyring_service = non_empty(key, value)?;
            }
            "security.keyring_user" => {
                self.security.keyring_user = non_empty(key, value)?;
            }
            "security.master_key_env" => {
                self.security.master_key_env = non_empty(key, value)?;
            }

            "security.master_key" => {
                return Err(anyhow!(
                    "The master key cannot be stored in configuration. \
                     Use the OS keyring or set the {} environment variable instead.",
                    self.security.master_key_env
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `vcsvault config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn non_empty(key: &str, value: &str) -> anyhow::Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(anyhow!("{} must not be empty", key));
    }
    Ok(value.to_string())
}
