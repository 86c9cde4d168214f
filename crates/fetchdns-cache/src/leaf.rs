//! Leaf record cache: the answer set for one (domain, record type) pair.

use crate::clock::{CleanupListener, LogicalClock};
use crate::{CacheEntry, CachedRecord};
use fetchdns_proto::Record;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug)]
struct Entries {
    records: Vec<(Record, u32)>,
    /// How long the absence of usable records stays authoritative.
    negative_ttl: Option<u32>,
}

/// TTL-bearing record set for one (domain, record type) pair.
///
/// The set is fixed at construction. Reads filter it by TTL; the only
/// mutation is the cleanup that discards the whole set once the clock's
/// horizon passes the leaf's sequence number.
pub struct LeafRecordCache {
    entries: RwLock<Option<Entries>>,
    inserted_at: Instant,
    created_sequence: i64,
    clock: Arc<LogicalClock>,
    subscribed: AtomicBool,
    me: Weak<LeafRecordCache>,
}

impl LeafRecordCache {
    /// Creates a leaf from a batch of entries.
    ///
    /// Entries without a record, or with an empty one, are not stored. When
    /// no entry carries a usable record, the longest of their TTLs marks the
    /// window during which the leaf answers negatively. Returns `None` when
    /// `entries` is empty.
    pub fn new(entries: Vec<CacheEntry>, clock: &Arc<LogicalClock>) -> Option<Arc<Self>> {
        if entries.is_empty() {
            return None;
        }

        let mut records = Vec::with_capacity(entries.len());
        let mut unusable_ttl: Option<u32> = None;
        for entry in entries {
            match entry.record {
                Some(record) if !record.is_empty() => records.push((record, entry.ttl)),
                _ => unusable_ttl = Some(unusable_ttl.map_or(entry.ttl, |t| t.max(entry.ttl))),
            }
        }
        // Once usable records expire the leaf is a miss, not a negative answer.
        let negative_ttl = if records.is_empty() { unusable_ttl } else { None };

        let leaf = Arc::new_cyclic(|me| Self {
            entries: RwLock::new(Some(Entries {
                records,
                negative_ttl,
            })),
            inserted_at: clock.now(),
            created_sequence: clock.next_value(),
            clock: Arc::clone(clock),
            subscribed: AtomicBool::new(false),
            me: me.clone(),
        });
        leaf.ensure_subscribed();
        Some(leaf)
    }

    /// Returns the sequence number drawn at construction.
    pub fn created_sequence(&self) -> i64 {
        self.created_sequence
    }

    /// Returns the entries still within their TTL at `now`.
    ///
    /// `Some(vec![])` is a negative answer: no usable records, but the
    /// negative window is still open. `None` means the leaf has nothing left
    /// to say and the caller should treat it as a miss.
    pub fn live_entries(&self, now: Instant) -> Option<Vec<CachedRecord>> {
        let guard = self.entries.read();
        let entries = guard.as_ref()?;
        let age = now.saturating_duration_since(self.inserted_at);

        let live: Vec<CachedRecord> = entries
            .records
            .iter()
            .filter(|(_, ttl)| age <= Duration::from_secs(u64::from(*ttl)))
            .map(|(record, ttl)| CachedRecord {
                record: record.clone(),
                ttl: remaining(*ttl, age),
            })
            .collect();

        let negative_live = entries
            .negative_ttl
            .is_some_and(|ttl| age <= Duration::from_secs(u64::from(ttl)));

        if live.is_empty() && !negative_live {
            None
        } else {
            Some(live)
        }
    }

    /// Reports whether the leaf has been cleared.
    ///
    /// A leaf that still holds data makes sure it is subscribed to the next
    /// cleanup broadcast.
    pub fn is_empty(&self) -> bool {
        let empty = self.entries.read().is_none();
        if !empty {
            self.ensure_subscribed();
        }
        empty
    }

    fn ensure_subscribed(&self) {
        if !self.subscribed.swap(true, Ordering::AcqRel) {
            let me: Weak<dyn CleanupListener> = self.me.clone();
            self.clock.subscribe(me);
        }
    }
}

impl CleanupListener for LeafRecordCache {
    fn on_cleanup(&self, horizon: i64) {
        self.subscribed.store(false, Ordering::Release);

        let mut entries = self.entries.write();
        if entries.is_none() {
            return;
        }
        if self.created_sequence <= horizon {
            trace!(
                sequence = self.created_sequence,
                horizon,
                "Reclaiming stale leaf"
            );
            *entries = None;
            return;
        }
        drop(entries);
        self.ensure_subscribed();
    }
}

/// Remaining TTL in whole seconds, never below one.
fn remaining(ttl: u32, age: Duration) -> u32 {
    let age = u32::try_from(age.as_secs()).unwrap_or(u32::MAX);
    ttl.saturating_sub(age).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockConfig;
    use crate::time::ManualTime;

    fn setup() -> (Arc<ManualTime>, Arc<LogicalClock>) {
        let time = Arc::new(ManualTime::new());
        let clock = LogicalClock::new(ClockConfig::default(), time.clone());
        (time, clock)
    }

    fn a(addr: &str, ttl: u32) -> CacheEntry {
        CacheEntry::new(Record::A(addr.to_string()), ttl)
    }

    #[test]
    fn test_ttl_liveness() {
        let (time, clock) = setup();
        let leaf = LeafRecordCache::new(vec![a("192.0.2.1", 1), a("192.0.2.2", 60)], &clock)
            .unwrap();

        let live = leaf.live_entries(clock.now()).unwrap();
        assert_eq!(live.len(), 2);

        time.advance(Duration::from_millis(1100));
        let live = leaf.live_entries(clock.now()).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].record, Record::A("192.0.2.2".into()));
        assert_eq!(live[0].ttl, 59);

        time.advance(Duration::from_secs(60));
        assert!(leaf.live_entries(clock.now()).is_none());
    }

    #[test]
    fn test_ttl_boundary_is_inclusive() {
        let (time, clock) = setup();
        let leaf = LeafRecordCache::new(vec![a("192.0.2.1", 1)], &clock).unwrap();
        time.advance(Duration::from_secs(1));
        assert_eq!(leaf.live_entries(clock.now()).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_batch_creates_nothing() {
        let (_, clock) = setup();
        assert!(LeafRecordCache::new(Vec::new(), &clock).is_none());
        assert_eq!(clock.listener_count(), 0);
    }

    #[test]
    fn test_negative_window() {
        let (time, clock) = setup();
        let leaf = LeafRecordCache::new(
            vec![CacheEntry::negative(30), CacheEntry::new(Record::Ptr(String::new()), 10)],
            &clock,
        )
        .unwrap();

        assert_eq!(leaf.live_entries(clock.now()), Some(Vec::new()));
        time.advance(Duration::from_secs(31));
        assert_eq!(leaf.live_entries(clock.now()), None);
    }

    #[test]
    fn test_mixed_batch_has_no_negative_window() {
        let (time, clock) = setup();
        let leaf =
            LeafRecordCache::new(vec![CacheEntry::negative(3600), a("192.0.2.7", 60)], &clock)
                .unwrap();

        assert_eq!(leaf.live_entries(clock.now()).unwrap().len(), 1);
        time.advance(Duration::from_secs(61));
        assert_eq!(leaf.live_entries(clock.now()), None);
    }

    #[test]
    fn test_cleanup_clears_stale_leaf() {
        let (_, clock) = setup();
        let leaf = LeafRecordCache::new(vec![a("192.0.2.1", 3600)], &clock).unwrap();
        assert!(!leaf.is_empty());

        leaf.on_cleanup(leaf.created_sequence());
        assert!(leaf.is_empty());
        assert!(leaf.live_entries(clock.now()).is_none());
    }

    #[test]
    fn test_cleanup_below_sequence_resubscribes() {
        let (_, clock) = setup();
        clock.next_value();
        let leaf = LeafRecordCache::new(vec![a("192.0.2.1", 3600)], &clock).unwrap();
        assert_eq!(clock.listener_count(), 1);

        leaf.on_cleanup(i64::MIN);
        assert!(!leaf.is_empty());
        assert!(leaf.live_entries(clock.now()).is_some());
        assert_eq!(clock.listener_count(), 2);
    }

    #[test]
    fn test_is_empty_does_not_duplicate_subscriptions() {
        let (_, clock) = setup();
        let leaf = LeafRecordCache::new(vec![a("192.0.2.1", 3600)], &clock).unwrap();
        for _ in 0..5 {
            assert!(!leaf.is_empty());
        }
        assert_eq!(clock.listener_count(), 1);
    }
}
