//! # fetchdns cache
//!
//! In-process DNS cache shaped like the domain tree.
//!
//! ## Architecture
//!
//! - **Domain tree**: one node per label, a leaf per record type
//! - **Leaves**: immutable TTL-bearing record sets, filtered on every read
//! - **Logical clock**: issues a sequence number per leaf and periodically
//!   broadcasts a horizon below which leaves are reclaimed
//!
//! TTL decides what a read can see. The clock decides when memory is given
//! back. There are no per-entry timers and no scans on the read path.

#![warn(missing_docs)]
#![warn(clippy::all)]

use fetchdns_proto::{hostname_labels, Record, RecordType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

pub mod clock;
pub mod leaf;
pub mod time;
pub mod tree;

pub use clock::{CleanupListener, ClockConfig, LogicalClock};
pub use leaf::LeafRecordCache;
pub use time::{ManualTime, SystemTime, TimeSource};
pub use tree::DomainTreeCache;

/// Cache errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The hostname could not be turned into a label path.
    #[error(transparent)]
    InvalidHostname(#[from] fetchdns_proto::Error),
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// An entry to be written into the cache.
///
/// `record` is `None` when an upstream answer could not be parsed. Such
/// entries are never returned by reads, but their TTL keeps the answer set
/// cached, so a name with no usable records is not queried again until then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The parsed record, if any.
    pub record: Option<Record>,
    /// TTL in seconds.
    pub ttl: u32,
}

impl CacheEntry {
    /// Creates an entry for a parsed record.
    pub fn new(record: Record, ttl: u32) -> Self {
        Self {
            record: Some(record),
            ttl,
        }
    }

    /// Creates an entry that only records the absence of usable answers.
    pub fn negative(ttl: u32) -> Self {
        Self { record: None, ttl }
    }
}

/// A live record read back from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRecord {
    /// The record.
    pub record: Record,
    /// Remaining TTL in seconds.
    pub ttl: u32,
}

/// DNS cache.
pub struct DnsCache {
    root: Arc<DomainTreeCache>,
    clock: Arc<LogicalClock>,
    stats: CacheStats,
}

impl DnsCache {
    /// Creates a cache driven by the system clock.
    pub fn new(config: ClockConfig) -> Self {
        Self::with_time(config, Arc::new(SystemTime))
    }

    /// Creates a cache driven by the given time source.
    pub fn with_time(config: ClockConfig, time: Arc<dyn TimeSource>) -> Self {
        Self::with_clock(LogicalClock::new(config, time))
    }

    /// Creates a cache on top of an existing clock.
    pub fn with_clock(clock: Arc<LogicalClock>) -> Self {
        Self {
            root: DomainTreeCache::new(&clock),
            clock,
            stats: CacheStats::default(),
        }
    }

    /// Replaces the cached answer set for `(hostname, rtype)`.
    ///
    /// An invalid hostname is rejected before anything is written. An empty
    /// batch removes the previous answer set.
    pub fn put(&self, hostname: &str, rtype: RecordType, entries: Vec<CacheEntry>) -> Result<()> {
        let labels = hostname_labels(hostname)?;
        self.clock.dispatch_pending();
        trace!(hostname, %rtype, entries = entries.len(), "Cache put");
        self.root.set_result(&labels, rtype, entries);
        Ok(())
    }

    /// Looks up the live answer set for `(hostname, rtype)`.
    ///
    /// `Ok(None)` is a miss. `Ok(Some(vec![]))` is a cached negative answer.
    pub fn check(&self, hostname: &str, rtype: RecordType) -> Result<Option<Vec<CachedRecord>>> {
        let labels = hostname_labels(hostname)?;
        self.clock.dispatch_pending();

        let result = self.root.get_result(&labels, rtype, self.clock.now());
        match &result {
            Some(records) if records.is_empty() => {
                trace!(hostname, %rtype, "Cache negative hit");
                self.stats.record_negative_hit();
            }
            Some(_) => {
                trace!(hostname, %rtype, "Cache hit");
                self.stats.record_hit();
            }
            None => {
                trace!(hostname, %rtype, "Cache miss");
                self.stats.record_miss();
            }
        }
        Ok(result)
    }

    /// Delivers any cleanup broadcast still waiting for a scheduling tick.
    pub fn flush(&self) -> usize {
        self.clock.dispatch_pending()
    }

    /// Prunes reclaimed nodes and reports whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.clock.dispatch_pending();
        self.root.is_empty()
    }

    /// Drops every cached answer.
    pub fn clear(&self) {
        self.root.clear();
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Returns the logical clock driving this cache.
    pub fn clock(&self) -> &Arc<LogicalClock> {
        &self.clock
    }
}

impl Default for DnsCache {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}

impl std::fmt::Debug for DnsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsCache")
            .field("clock", &self.clock)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    negative_hits: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_negative_hit(&self) {
        self.negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookups answered with records.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Lookups answered by a cached empty result.
    pub fn negative_hits(&self) -> u64 {
        self.negative_hits.load(Ordering::Relaxed)
    }

    /// Fraction of lookups served from the cache, negative hits included.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() + self.negative_hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
