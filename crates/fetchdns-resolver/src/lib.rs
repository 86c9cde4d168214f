//! # fetchdns resolver
//!
//! Resolves hostnames by asking DNS-over-HTTPS providers for
//! `application/dns-json` answers, with a TTL-faithful in-process cache in
//! front of them.
//!
//! ## Features
//!
//! - One resolver object covering A, AAAA, CNAME, MX, NAPTR, NS, PTR, SOA,
//!   SRV, TXT and wildcard queries
//! - Random upstream selection per query
//! - Negative caching of empty and failed answers
//! - IPv4/IPv6 address lookup with first-success racing

use fetchdns_cache::{CacheError, ClockConfig};
use fetchdns_proto::{RecordType, DEFAULT_TTL_SECS};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub mod engine;
pub mod lookup;
pub mod transport;
pub mod upstream;

pub use engine::{DohResolver, TtlAddress};
pub use lookup::{Family, LookupAddress};
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use upstream::{default_servers, ServerList, DEFAULT_SERVERS};

/// Resolver error.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error(transparent)]
    InvalidHostname(#[from] CacheError),

    #[error("No {rtype} record found for {hostname}")]
    NotFound { hostname: String, rtype: RecordType },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("No upstream servers configured")]
    NoServers,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ResolverError {
    /// Returns true for capabilities that have no DoH implementation.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented(_))
    }

    pub(crate) fn not_found(hostname: &str, rtype: RecordType) -> Self {
        Self::NotFound {
            hostname: hostname.to_string(),
            rtype,
        }
    }
}

impl From<reqwest::Error> for ResolverError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upstream DoH endpoints.
    pub servers: Vec<Url>,

    /// TTL used when a provider omits one, and for negative answers.
    pub default_ttl: u32,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// User agent sent to providers.
    pub user_agent: Option<String>,

    /// Cache cleanup scheduling.
    pub cache: ClockConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            default_ttl: DEFAULT_TTL_SECS,
            timeout: Duration::from_secs(5),
            user_agent: None,
            cache: ClockConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.default_ttl, 3600);
        assert_eq!(config.cache.batch_size, 1000);
    }

    #[test]
    fn test_error_kinds() {
        assert!(ResolverError::NotImplemented("reverse".into()).is_not_implemented());
        assert!(!ResolverError::NoServers.is_not_implemented());
        assert_eq!(
            ResolverError::not_found("example.com", RecordType::SOA).to_string(),
            "No SOA record found for example.com"
        );
    }
}
