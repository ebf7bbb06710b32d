//! Configuration handling for dbdiff

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::compare::ComparisonLevel;
use crate::error::{Error, Result};

/// Load configuration from a TOML or YAML file, chosen by extension
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let is_yaml = matches!(
        Path::new(path).extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    let config: Config = if is_yaml {
        serde_yaml::from_str(&config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?
    } else {
        toml::from_str(&config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?
    };

    config.validate()?;
    Ok(config)
}

/// Represents the complete dbdiff configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// The reference database
    pub source: DatabaseConfig,
    /// The database checked against the reference
    pub target: DatabaseConfig,
    #[serde(default)]
    pub compare: CompareConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Build a configuration from two connection URLs with default settings
    pub fn from_urls(source: &str, target: &str) -> Self {
        Self {
            source: DatabaseConfig::from_url(source),
            target: DatabaseConfig::from_url(target),
            compare: CompareConfig::default(),
            logging: None,
        }
    }

    /// Check settings that deserialization alone cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.source.url.is_empty() || self.target.url.is_empty() {
            return Err(Error::ConfigError(
                "both source and target url must be set".to_string(),
            ));
        }
        self.compare.validate()
    }
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// `postgres`, `mysql` or `sqlite`; inferred from the url scheme when absent
    pub driver: Option<String>,
    pub url: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub schema: Option<String>,
}

impl DatabaseConfig {
    pub fn from_url(url: &str) -> Self {
        Self {
            driver: None,
            url: url.to_string(),
            pool_size: None,
            timeout_seconds: None,
            schema: None,
        }
    }

    /// The configured driver, falling back to the url scheme
    pub fn driver_name(&self) -> Result<String> {
        if let Some(driver) = &self.driver {
            return Ok(driver.to_lowercase());
        }

        let scheme = self
            .url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_lowercase())
            .ok_or_else(|| {
                Error::ConfigError(format!("Cannot infer driver from url: {}", self.url))
            })?;

        match scheme.as_str() {
            "postgres" | "postgresql" => Ok("postgres".to_string()),
            "mysql" | "mariadb" => Ok("mysql".to_string()),
            "sqlite" => Ok("sqlite".to_string()),
            other => Err(Error::ConfigError(format!(
                "Unsupported url scheme: {}",
                other
            ))),
        }
    }
}

/// Comparison behaviour configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CompareConfig {
    /// Deepest level evaluated for every object
    pub max_level: ComparisonLevel,
    /// Objects compared concurrently
    pub workers: usize,
    /// Row fetches in flight per table during the row content scan
    pub key_workers: usize,
    /// Deadline for a single object's comparison
    pub object_timeout_seconds: Option<u64>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            max_level: ComparisonLevel::Existence,
            workers: 4,
            key_workers: 8,
            object_timeout_seconds: None,
        }
    }
}

impl CompareConfig {
    pub fn with_max_level(mut self, level: ComparisonLevel) -> Self {
        self.max_level = level;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Queries one side can have in flight at once
    ///
    /// Up to `workers` objects run their table-level checks while a single
    /// table's record scan runs `key_workers` row fetches.
    pub fn connections_per_side(&self) -> u32 {
        (self.workers.max(1) + self.key_workers.max(1)) as u32
    }

    pub fn object_timeout(&self) -> Option<Duration> {
        self.object_timeout_seconds.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::ConfigError("compare.workers must be at least 1".to_string()));
        }
        if self.key_workers == 0 {
            return Err(Error::ConfigError(
                "compare.key_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}
