//! # fetchdns configuration
//!
//! Serde configuration for the resolver, the cache and logging.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! Files may be YAML, JSON or TOML; the extension decides, YAML otherwise.

use fetchdns_cache::ClockConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub mod resolver;

pub use resolver::ResolverConfig;

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("File not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream resolution.
    pub resolver: ResolverConfig,

    /// Cache cleanup scheduling.
    pub cache: CacheConfig,

    /// Logging.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => Self::from_yaml(&content)?,
        };

        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document instead of applying defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.resolver.validate()?;
        self.cache.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Builds the resolver's runtime configuration.
    pub fn resolver_config(&self) -> fetchdns_resolver::ResolverConfig {
        fetchdns_resolver::ResolverConfig {
            servers: self.resolver.servers.clone(),
            default_ttl: self.resolver.default_ttl_secs,
            timeout: self.resolver.timeout(),
            user_agent: self.resolver.user_agent.clone(),
            cache: self.cache.clock_config(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Leaves created between cleanup broadcasts.
    pub batch_size: u64,

    /// Maximum time between cleanup broadcasts (seconds).
    pub clean_period_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let clock = ClockConfig::default();
        Self {
            batch_size: clock.batch_size,
            clean_period_secs: clock.clean_period.as_secs(),
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.clean_period_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.clean_period_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Builds the logical clock configuration.
    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig {
            batch_size: self.batch_size,
            clean_period: Duration::from_secs(self.clean_period_secs),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive.
    pub level: String,

    /// Log format (text, json).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        match self.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                message: format!("expected text or json, got {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use url::Url;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolver.servers.len(), 2);
        assert_eq!(config.resolver.default_ttl_secs, 3600);
        assert_eq!(config.cache.batch_size, 1000);
        assert_eq!(config.cache.clean_period_secs, 600);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.resolver.servers, parsed.resolver.servers);
        assert_eq!(config.logging.level, parsed.logging.level);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml(
            "resolver:\n  servers:\n    - https://doh.example.net/dns-query\ncache:\n  batch_size: 50\n",
        )
        .unwrap();
        assert_eq!(
            config.resolver.servers,
            vec![Url::parse("https://doh.example.net/dns-query").unwrap()]
        );
        assert_eq!(config.resolver.timeout_ms, 5000);
        assert_eq!(config.cache.batch_size, 50);
        assert_eq!(config.cache.clean_period_secs, 600);

        assert!(Config::from_yaml("").unwrap().validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.resolver.servers.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::default();
        config.resolver.servers = vec![Url::parse("ftp://dns.example.net/").unwrap()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "resolver.servers"
        ));

        let mut config = Config::default();
        config.cache.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("fetchdns.toml");
        std::fs::write(&toml_path, "[resolver]\ndefault_ttl_secs = 120\n").unwrap();
        assert_eq!(Config::from_file(&toml_path).unwrap().resolver.default_ttl_secs, 120);

        let json_path = dir.path().join("fetchdns.json");
        std::fs::write(&json_path, r#"{"logging": {"level": "debug", "format": "json"}}"#).unwrap();
        let config = Config::from_file(&json_path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");

        let mut yaml = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(yaml, "cache:\n  clean_period_secs: 30").unwrap();
        assert_eq!(Config::from_file(yaml.path()).unwrap().cache.clean_period_secs, 30);

        assert!(matches!(
            Config::from_file(dir.path().join("missing.yaml")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_runtime_conversion() {
        let mut config = Config::default();
        config.resolver.timeout_ms = 1500;
        config.cache.batch_size = 10;

        let runtime = config.resolver_config();
        assert_eq!(runtime.timeout, Duration::from_millis(1500));
        assert_eq!(runtime.cache.batch_size, 10);
        assert_eq!(runtime.servers, config.resolver.servers);
    }
}
