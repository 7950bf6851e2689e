//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::search::compiler::{DEFAULT_PAGE_SIZE, QueryCompiler};
use crate::search::pipeline::DEFAULT_QUEUE_CAPACITY;
use crate::search::si::PrefixPolicy;

/// Partsearch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Rows per result page
    pub page_size: u32,
    /// Tokens buffered between the lexer task and the filter builder
    pub queue_capacity: usize,
    /// Reject numbers with an unknown prefix suffix instead of ignoring it
    pub strict_prefixes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Catalog database file; defaults to `catalog.db` in the config directory
    pub path: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            strict_prefixes: false,
        }
    }
}

impl SearchConfig {
    pub fn prefix_policy(&self) -> PrefixPolicy {
        if self.strict_prefixes {
            PrefixPolicy::Strict
        } else {
            PrefixPolicy::Lenient
        }
    }

    pub fn compiler(&self) -> QueryCompiler {
        QueryCompiler::new(self.page_size)
    }
}

/// Keys accepted by [`Config::get`] and [`Config::set`]
pub const CONFIG_KEYS: [&str; 4] = [
    "search.page_size",
    "search.queue_capacity",
    "search.strict_prefixes",
    "database.path",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("PARTSEARCH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("partsearch")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
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
        if self.search.page_size == 0 {
            return Err(anyhow!("search.page_size must be at least 1"));
        }
        if self.search.queue_capacity == 0 {
            return Err(anyhow!("search.queue_capacity must be at least 1"));
        }
        Ok(())
    }

    /// Resolved catalog database path
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        Self::config_dir()
            .map(|dir| dir.join("catalog.db"))
            .unwrap_or_else(|_| PathBuf::from("catalog.db"))
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "search.page_size" => Ok(self.search.page_size.to_string()),
            "search.queue_capacity" => Ok(self.search.queue_capacity.to_string()),
            "search.strict_prefixes" => Ok(self.search.strict_prefixes.to_string()),
            "database.path" => Ok(self
                .database
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default)".to_string())),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `partsearch config show` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "search.page_size" => {
                let size: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid page_size value: {}", value))?;
                if size == 0 {
                    return Err(anyhow!("Page size must be at least 1"));
                }
                self.search.page_size = size;
            }
            "search.queue_capacity" => {
                let capacity: usize = value
                    .parse()
                    .with_context(|| format!("Invalid queue_capacity value: {}", value))?;
                if capacity == 0 {
                    return Err(anyhow!("Queue capacity must be at least 1"));
                }
                self.search.queue_capacity = capacity;
            }
            "search.strict_prefixes" => {
                self.search.strict_prefixes = value
                    .parse()
                    .with_context(|| format!("Invalid strict_prefixes value: {}", value))?;
            }
            "database.path" => {
                self.database.path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `partsearch config show` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        CONFIG_KEYS
            .into_iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.search.page_size, 10);
        assert_eq!(config.search.queue_capacity, 16);
        assert!(!config.search.strict_prefixes);
        assert!(config.database.path.is_none());
        assert_eq!(config.search.prefix_policy(), PrefixPolicy::Lenient);
        assert_eq!(config.search.compiler().page_size(), 10);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("search.page_size", "25").unwrap();
        config.set("search.strict_prefixes", "true").unwrap();
        config.set("database.path", "/tmp/parts.db").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.search.prefix_policy(), PrefixPolicy::Strict);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[search]\npage_size = 50\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.search.page_size, 50);
        assert_eq!(config.search.queue_capacity, 16);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[search]\npage_size = 0\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("search.page_size", "0").is_err());
        assert!(config.set("search.page_size", "ten").is_err());
        assert!(config.set("search.queue_capacity", "0").is_err());
        assert!(config.set("search.strict_prefixes", "maybe").is_err());
        assert!(config.set("no.such_key", "1").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_get_and_list() {
        let config = Config::default();
        assert_eq!(config.get("search.page_size").unwrap(), "10");
        assert_eq!(config.get("database.path").unwrap(), "(default)");
        assert!(config.get("bogus").is_err());

        let listed = config.list().unwrap();
        assert_eq!(listed.len(), CONFIG_KEYS.len());
    }

    #[test]
    fn test_explicit_database_path() {
        let mut config = Config::default();
        config.set("database.path", "/data/catalog.db").unwrap();
        assert_eq!(
            config.database_path(),
            PathBuf::from("/data/catalog.db")
        );

        config.set("database.path", "").unwrap();
        assert!(config.database.path.is_none());
    }
}
