//! Resolver configuration.

use super::{ConfigError, Result};
use fetchdns_resolver::default_servers;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// DoH endpoints queried with `?name=...&type=...`.
    pub servers: Vec<Url>,

    /// TTL for answers that carry none, and for negative answers (seconds).
    pub default_ttl_secs: u32,

    /// HTTP request timeout (milliseconds).
    pub timeout_ms: u64,

    /// User agent sent to providers.
    pub user_agent: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            default_ttl_secs: fetchdns_resolver::ResolverConfig::default().default_ttl,
            timeout_ms: 5000,
            user_agent: None,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(ConfigError::Validation(
                "At least one upstream server is required".to_string(),
            ));
        }

        if let Some(server) = self
            .servers
            .iter()
            .find(|s| !matches!(s.scheme(), "https" | "http"))
        {
            return Err(ConfigError::InvalidValue {
                field: "resolver.servers".to_string(),
                message: format!("unsupported scheme in {server}"),
            });
        }

        if self.default_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.default_ttl_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
