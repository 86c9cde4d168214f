//! Upstream server list.

use fetchdns_proto::RecordType;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use tracing::debug;
use url::Url;

/// Endpoints used when no servers are configured.
pub const DEFAULT_SERVERS: [&str; 2] = [
    "https://dns.google.com/resolve",
    "https://cloudflare-dns.com/dns-query",
];

/// Returns the default endpoints as parsed URLs.
pub fn default_servers() -> Vec<Url> {
    DEFAULT_SERVERS
        .iter()
        .filter_map(|s| Url::parse(s).ok())
        .collect()
}

/// The configured DoH endpoints.
///
/// Each query goes to one endpoint chosen uniformly at random. There is no
/// health tracking.
#[derive(Debug)]
pub struct ServerList {
    servers: RwLock<Vec<Url>>,
}

impl ServerList {
    /// Creates a list; an empty `servers` means the defaults.
    pub fn new(servers: Vec<Url>) -> Self {
        let servers = if servers.is_empty() {
            default_servers()
        } else {
            servers
        };
        Self {
            servers: RwLock::new(servers),
        }
    }

    /// Returns a copy of the current list.
    pub fn get(&self) -> Vec<Url> {
        self.servers.read().clone()
    }

    /// Replaces the list. An empty list is ignored and the current one kept.
    pub fn set(&self, servers: Vec<Url>) {
        if servers.is_empty() {
            debug!("Ignoring empty server list");
            return;
        }
        *self.servers.write() = servers;
    }

    /// Picks one server at random.
    pub fn pick(&self) -> Option<Url> {
        self.servers.read().choose(&mut rand::thread_rng()).cloned()
    }
}

impl Default for ServerList {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Builds the query URL `<server>?name=<hostname>&type=<TYPE>`.
///
/// Existing query parameters on the server URL are kept.
pub fn query_url(server: &Url, hostname: &str, rtype: RecordType) -> Url {
    let mut url = server.clone();
    url.query_pairs_mut()
        .append_pair("name", hostname)
        .append_pair("type", rtype.query_param());
    url
}
