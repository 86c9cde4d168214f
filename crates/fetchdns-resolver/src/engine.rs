//! Resolution engine.

use crate::transport::{HttpTransport, Transport};
use crate::upstream::{query_url, ServerList};
use crate::{ResolverConfig, ResolverError, Result};
use fetchdns_cache::{CacheEntry, CachedRecord, DnsCache};
use fetchdns_proto::{
    parse_answer, registry, AnyRecord, DohAnswer, DohMessage, Mx, Naptr, Record, RecordType, Soa,
    Srv,
};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// An address together with its TTL in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtlAddress {
    /// Address in presentation format.
    pub address: String,
    /// Remaining TTL.
    pub ttl: u32,
}

/// DNS-over-HTTPS resolver.
///
/// Every query first consults the cache. A cached answer, including a cached
/// empty one, is returned without touching the network. Concurrent misses
/// for the same name each go upstream.
pub struct DohResolver {
    config: ResolverConfig,
    cache: DnsCache,
    servers: ServerList,
    transport: Arc<dyn Transport>,
}

impl DohResolver {
    /// Creates a resolver that talks HTTP.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a resolver on top of a custom transport.
    pub fn with_transport(config: ResolverConfig, transport: Arc<dyn Transport>) -> Self {
        let cache = DnsCache::new(config.cache.clone());
        Self::with_parts(config, transport, cache)
    }

    /// Creates a resolver from a transport and a prepared cache.
    pub fn with_parts(config: ResolverConfig, transport: Arc<dyn Transport>, cache: DnsCache) -> Self {
        Self {
            servers: ServerList::new(config.servers.clone()),
            config,
            cache,
            transport,
        }
    }

    /// Returns the resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the cache.
    pub fn cache(&self) -> &DnsCache {
        &self.cache
    }

    /// Returns the configured upstream servers.
    pub fn get_servers(&self) -> Vec<Url> {
        self.servers.get()
    }

    /// Replaces the upstream servers; an empty list leaves them unchanged.
    pub fn set_servers(&self, servers: Vec<Url>) {
        self.servers.set(servers);
    }

    /// Resolves `rtype` records for `hostname`.
    pub async fn resolve(&self, hostname: &str, rtype: RecordType) -> Result<Vec<Record>> {
        Ok(self
            .resolve_with_ttl(hostname, rtype)
            .await?
            .into_iter()
            .map(|r| r.record)
            .collect())
    }

    /// Resolves `rtype` records for `hostname`, keeping their TTLs.
    pub async fn resolve_with_ttl(
        &self,
        hostname: &str,
        rtype: RecordType,
    ) -> Result<Vec<CachedRecord>> {
        if rtype.is_any() {
            self.resolve_wildcard(hostname).await
        } else {
            self.resolve_type(hostname, rtype).await
        }
    }

    /// Resolves records by type mnemonic, `A` when none is given.
    pub async fn resolve_by_name(&self, hostname: &str, rtype: Option<&str>) -> Result<Vec<Record>> {
        let rtype = match rtype {
            Some(name) => supported_type(name)?,
            None => RecordType::A,
        };
        self.resolve(hostname, rtype).await
    }

    /// Resolves IPv4 addresses.
    pub async fn resolve4(&self, hostname: &str) -> Result<Vec<String>> {
        self.texts(hostname, RecordType::A).await
    }

    /// Resolves IPv6 addresses.
    pub async fn resolve6(&self, hostname: &str) -> Result<Vec<String>> {
        self.texts(hostname, RecordType::AAAA).await
    }

    /// Resolves IPv4 addresses with their TTLs.
    pub async fn resolve4_with_ttl(&self, hostname: &str) -> Result<Vec<TtlAddress>> {
        self.addresses_with_ttl(hostname, RecordType::A).await
    }

    /// Resolves IPv6 addresses with their TTLs.
    pub async fn resolve6_with_ttl(&self, hostname: &str) -> Result<Vec<TtlAddress>> {
        self.addresses_with_ttl(hostname, RecordType::AAAA).await
    }

    /// Resolves canonical names.
    pub async fn resolve_cname(&self, hostname: &str) -> Result<Vec<String>> {
        self.texts(hostname, RecordType::CNAME).await
    }

    /// Resolves mail exchangers.
    pub async fn resolve_mx(&self, hostname: &str) -> Result<Vec<Mx>> {
        let records = self.resolve(hostname, RecordType::MX).await?;
        Ok(extract(records, |r| match r {
            Record::Mx(mx) => Some(mx),
            _ => None,
        }))
    }

    /// Resolves naming authority pointers.
    pub async fn resolve_naptr(&self, hostname: &str) -> Result<Vec<Naptr>> {
        let records = self.resolve(hostname, RecordType::NAPTR).await?;
        Ok(extract(records, |r| match r {
            Record::Naptr(naptr) => Some(naptr),
            _ => None,
        }))
    }

    /// Resolves name servers.
    pub async fn resolve_ns(&self, hostname: &str) -> Result<Vec<String>> {
        self.texts(hostname, RecordType::NS).await
    }

    /// Resolves pointer records.
    pub async fn resolve_ptr(&self, hostname: &str) -> Result<Vec<String>> {
        self.texts(hostname, RecordType::PTR).await
    }

    /// Resolves the start of authority; fails with `NotFound` when there is none.
    pub async fn resolve_soa(&self, hostname: &str) -> Result<Soa> {
        let records = self.resolve(hostname, RecordType::SOA).await?;
        extract(records, |r| match r {
            Record::Soa(soa) => Some(soa),
            _ => None,
        })
        .into_iter()
        .next()
        .ok_or_else(|| ResolverError::not_found(hostname, RecordType::SOA))
    }

    /// Resolves service locators.
    pub async fn resolve_srv(&self, hostname: &str) -> Result<Vec<Srv>> {
        let records = self.resolve(hostname, RecordType::SRV).await?;
        Ok(extract(records, |r| match r {
            Record::Srv(srv) => Some(srv),
            _ => None,
        }))
    }

    /// Resolves text records.
    pub async fn resolve_txt(&self, hostname: &str) -> Result<Vec<Vec<String>>> {
        let records = self.resolve(hostname, RecordType::TXT).await?;
        Ok(extract(records, |r| match r {
            Record::Txt(strings) => Some(strings),
            _ => None,
        }))
    }

    /// Resolves every supported record type present for `hostname`.
    pub async fn resolve_any(&self, hostname: &str) -> Result<Vec<AnyRecord>> {
        let records = self.resolve(hostname, RecordType::ANY).await?;
        Ok(extract(records, |r| match r {
            Record::Any(any) => Some(any),
            _ => None,
        }))
    }

    async fn texts(&self, hostname: &str, rtype: RecordType) -> Result<Vec<String>> {
        let records = self.resolve(hostname, rtype).await?;
        Ok(extract(records, |r| match r {
            Record::A(s) | Record::Aaaa(s) | Record::Cname(s) | Record::Ns(s) | Record::Ptr(s) => {
                Some(s)
            }
            _ => None,
        }))
    }

    async fn addresses_with_ttl(&self, hostname: &str, rtype: RecordType) -> Result<Vec<TtlAddress>> {
        let records = self.resolve_with_ttl(hostname, rtype).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r.record {
                Record::A(address) | Record::Aaaa(address) => Some(TtlAddress {
                    address,
                    ttl: r.ttl,
                }),
                _ => None,
            })
            .collect())
    }

    /// Cache lookup, then one upstream query on a miss.
    async fn resolve_type(&self, hostname: &str, rtype: RecordType) -> Result<Vec<CachedRecord>> {
        if let Some(cached) = self.cache.check(hostname, rtype)? {
            trace!(hostname, %rtype, records = cached.len(), "Serving cached result");
            return Ok(cached);
        }

        let message = self.query(hostname, rtype).await?;
        let answers = message.map(|m| m.answer).unwrap_or_default();
        let entries = self.to_entries(hostname, rtype, &answers);

        let records: Vec<CachedRecord> = entries
            .iter()
            .filter_map(|entry| {
                entry.record.clone().map(|record| CachedRecord {
                    record,
                    ttl: entry.ttl,
                })
            })
            .collect();

        self.cache.put(hostname, rtype, entries)?;
        if records.is_empty() {
            debug!(hostname, %rtype, "Returning an empty result");
        }
        Ok(records)
    }

    /// Wildcard query: discover the types present, then resolve each one.
    async fn resolve_wildcard(&self, hostname: &str) -> Result<Vec<CachedRecord>> {
        if let Some(cached) = self.cache.check(hostname, RecordType::ANY)? {
            return Ok(cached);
        }

        let message = self.query(hostname, RecordType::ANY).await?;
        let mut codes: Vec<u16> = Vec::new();
        for code in message.iter().flat_map(|m| &m.answer).filter_map(|a| a.rtype) {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }

        let per_type = try_join_all(codes.into_iter().map(|code| self.resolve_discovered(hostname, code)))
            .await?;
        let records: Vec<CachedRecord> = per_type.into_iter().flatten().collect();

        let mut entries: Vec<CacheEntry> = records
            .iter()
            .map(|r| CacheEntry::new(r.record.clone(), r.ttl))
            .collect();
        if entries.is_empty() {
            entries.push(CacheEntry::negative(self.config.default_ttl));
        }
        self.cache.put(hostname, RecordType::ANY, entries)?;

        Ok(records)
    }

    async fn resolve_discovered(&self, hostname: &str, code: u16) -> Result<Vec<CachedRecord>> {
        let Some(name) = registry().lookup(code) else {
            debug!(hostname, code, "Skipping unregistered record type");
            return Ok(Vec::new());
        };

        let resolved = match supported_type(name) {
            Ok(rtype) if !rtype.is_any() => self.resolve_type(hostname, rtype).await,
            Ok(_) => Err(ResolverError::NotImplemented("nested wildcard queries".into())),
            Err(e) => Err(e),
        };

        match resolved {
            Ok(records) => Ok(records
                .into_iter()
                .map(|r| CachedRecord {
                    record: Record::Any(AnyRecord::new(name, r.record)),
                    ttl: r.ttl,
                })
                .collect()),
            Err(e) if e.is_not_implemented() => {
                debug!(hostname, rtype = name, "Skipping lookup for unsupported record type");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Sends one query. `Ok(None)` stands for a non-success HTTP status.
    async fn query(&self, hostname: &str, rtype: RecordType) -> Result<Option<DohMessage>> {
        let server = self.servers.pick().ok_or(ResolverError::NoServers)?;
        let url = query_url(&server, hostname, rtype);

        trace!(hostname, %rtype, server = %server, "Querying upstream");
        let response = self.transport.fetch(&url).await?;

        if !response.is_success() {
            debug!(
                hostname,
                %rtype,
                server = %server,
                status = response.status,
                "Upstream response was not OK"
            );
            return Ok(None);
        }

        let message = response.json()?;
        trace!(hostname, %rtype, answers = message.answer.len(), "Received upstream answer");
        Ok(Some(message))
    }

    /// Maps raw answers to cache entries. Answers that cannot be used keep
    /// their TTL without a record; no answers at all become one negative
    /// entry with the default TTL.
    fn to_entries(&self, hostname: &str, rtype: RecordType, answers: &[DohAnswer]) -> Vec<CacheEntry> {
        let default_ttl = self.config.default_ttl;
        let mut entries: Vec<CacheEntry> = answers
            .iter()
            .map(|answer| {
                let ttl = answer.ttl_or(default_ttl);
                if answer.rtype.is_some_and(|code| code != rtype.to_u16()) {
                    trace!(hostname, %rtype, code = ?answer.rtype, "Skipping answer of another type");
                    return CacheEntry::negative(ttl);
                }
                match parse_answer(rtype, &answer.data) {
                    Some(record) => CacheEntry::new(record, ttl),
                    None => {
                        debug!(hostname, %rtype, data = %answer.data, "Dropping unparsable record");
                        CacheEntry::negative(ttl)
                    }
                }
            })
            .collect();

        if entries.is_empty() {
            entries.push(CacheEntry::negative(default_ttl));
        }
        entries
    }
}

impl std::fmt::Debug for DohResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DohResolver")
            .field("config", &self.config)
            .field("servers", &self.servers)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Maps a mnemonic to a resolvable record type.
fn supported_type(name: &str) -> Result<RecordType> {
    name.parse()
        .map_err(|_| ResolverError::NotImplemented(format!("resolving {name} records")))
}

fn extract<T>(records: Vec<Record>, f: impl FnMut(Record) -> Option<T>) -> Vec<T> {
    records.into_iter().filter_map(f).collect()
}
