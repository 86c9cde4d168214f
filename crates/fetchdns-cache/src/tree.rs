//! Domain tree cache.
//!
//! One node per label, most significant label first: `www.example.com` is
//! stored under root → `com` → `example` → `www`. Each node holds a leaf per
//! record type and its child nodes. Nodes are created on write and pruned
//! during cleanup broadcasts once they hold nothing.
//!
//! Locks are always taken parent before child, and a writer holds a node's
//! lock only long enough to find or create the next child. Siblings are
//! therefore written concurrently. A node removed by pruning is marked
//! detached under its own write lock; a writer that reaches a detached node
//! backs off and retries from the parent.

use crate::clock::{CleanupListener, LogicalClock};
use crate::leaf::LeafRecordCache;
use crate::{CacheEntry, CachedRecord};
use fetchdns_proto::RecordType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::trace;

#[derive(Default)]
struct Node {
    per_type: HashMap<RecordType, Arc<LeafRecordCache>>,
    children: HashMap<String, Arc<DomainTreeCache>>,
}

/// A node of the domain tree.
pub struct DomainTreeCache {
    inner: RwLock<Node>,
    clock: Arc<LogicalClock>,
    subscribed: AtomicBool,
    /// Set once the node has been unlinked from its parent.
    detached: AtomicBool,
    me: Weak<DomainTreeCache>,
}

impl DomainTreeCache {
    /// Creates an empty node.
    pub fn new(clock: &Arc<LogicalClock>) -> Arc<Self> {
        let node = Arc::new_cyclic(|me| Self {
            inner: RwLock::new(Node::default()),
            clock: Arc::clone(clock),
            subscribed: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            me: me.clone(),
        });
        node.ensure_subscribed();
        node
    }

    /// Stores `entries` for `rtype` at the node addressed by `labels`.
    ///
    /// The previous leaf for that type is replaced, never merged. An empty
    /// batch removes it. Leaves of other types and sibling subtrees are left
    /// untouched.
    pub fn set_result(&self, labels: &[String], rtype: RecordType, entries: Vec<CacheEntry>) {
        if let Err(entries) = self.try_set_result(labels, rtype, entries) {
            trace!(entries = entries.len(), "Dropping write into a detached subtree");
        }
    }

    /// Writes below this node, handing `entries` back if the node was
    /// detached before the write landed.
    fn try_set_result(
        &self,
        labels: &[String],
        rtype: RecordType,
        entries: Vec<CacheEntry>,
    ) -> Result<(), Vec<CacheEntry>> {
        let Some((head, rest)) = labels.split_first() else {
            let mut inner = self.inner.write();
            if self.is_detached() {
                return Err(entries);
            }
            match LeafRecordCache::new(entries, &self.clock) {
                Some(leaf) => {
                    inner.per_type.insert(rtype, leaf);
                }
                None => {
                    inner.per_type.remove(&rtype);
                }
            }
            drop(inner);
            self.ensure_subscribed();
            return Ok(());
        };

        let mut entries = entries;
        loop {
            let Some(child) = self.child_for_write(head) else {
                return Err(entries);
            };
            match child.try_set_result(rest, rtype, entries) {
                Ok(()) => {
                    self.ensure_subscribed();
                    return Ok(());
                }
                Err(returned) => {
                    trace!(label = %head, "Child pruned during write, retrying");
                    entries = returned;
                }
            }
        }
    }

    /// Returns the child for `label`, creating it if needed. `None` when
    /// this node has been detached.
    fn child_for_write(&self, label: &str) -> Option<Arc<DomainTreeCache>> {
        {
            let inner = self.inner.read();
            if self.is_detached() {
                return None;
            }
            if let Some(child) = inner.children.get(label) {
                return Some(Arc::clone(child));
            }
        }

        let mut inner = self.inner.write();
        if self.is_detached() {
            return None;
        }
        let child = inner
            .children
            .entry(label.to_string())
            .or_insert_with(|| DomainTreeCache::new(&self.clock));
        Some(Arc::clone(child))
    }

    /// Returns the live records for `rtype` at the node addressed by `labels`.
    ///
    /// `None` when no such node or leaf exists, when the leaf was reclaimed,
    /// or when everything in it has expired. `Some(vec![])` is a live
    /// negative answer.
    pub fn get_result(
        &self,
        labels: &[String],
        rtype: RecordType,
        now: Instant,
    ) -> Option<Vec<CachedRecord>> {
        let inner = self.inner.read();
        match labels.split_first() {
            None => {
                let leaf = inner.per_type.get(&rtype)?;
                if leaf.is_empty() {
                    return None;
                }
                leaf.live_entries(now)
            }
            Some((head, rest)) => inner.children.get(head)?.get_result(rest, rtype, now),
        }
    }

    /// Prunes empty leaves and children, then reports whether this node
    /// holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.prune()
    }

    /// Returns the number of child nodes.
    pub fn child_count(&self) -> usize {
        self.inner.read().children.len()
    }

    /// Returns the number of leaves held directly by this node.
    pub fn leaf_count(&self) -> usize {
        self.inner.read().per_type.len()
    }

    /// Drops every leaf and child.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.per_type.clear();
        for (_, child) in inner.children.drain() {
            child.detach();
        }
    }

    fn prune(&self) -> bool {
        Self::prune_node(&mut self.inner.write())
    }

    fn prune_node(inner: &mut Node) -> bool {
        inner.children.retain(|label, child| {
            let keep = !child.detach_if_empty();
            if !keep {
                trace!(label = %label, "Pruning empty subtree");
            }
            keep
        });
        inner.per_type.retain(|_, leaf| !leaf.is_empty());
        inner.children.is_empty() && inner.per_type.is_empty()
    }

    /// Prunes this node and marks it detached if nothing is left. Runs under
    /// the node's write lock so no writer can slip in between the two.
    fn detach_if_empty(&self) -> bool {
        let mut inner = self.inner.write();
        let empty = Self::prune_node(&mut inner);
        if empty {
            self.detached.store(true, Ordering::Release);
        }
        empty
    }

    fn detach(&self) {
        let mut inner = self.inner.write();
        self.detached.store(true, Ordering::Release);
        inner.per_type.clear();
        for (_, child) in inner.children.drain() {
            child.detach();
        }
    }

    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    fn ensure_subscribed(&self) {
        if !self.subscribed.swap(true, Ordering::AcqRel) {
            let me: Weak<dyn CleanupListener> = self.me.clone();
            self.clock.subscribe(me);
        }
    }
}

impl CleanupListener for DomainTreeCache {
    fn on_cleanup(&self, _horizon: i64) {
        self.subscribed.store(false, Ordering::Release);
        if self.is_detached() {
            return;
        }
        if !self.prune() {
            self.ensure_subscribed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockConfig;
    use crate::time::ManualTime;
    use fetchdns_proto::{hostname_labels, Record};
    use std::time::Duration;

    fn setup() -> (Arc<ManualTime>, Arc<LogicalClock>, Arc<DomainTreeCache>) {
        let time = Arc::new(ManualTime::new());
        let clock = LogicalClock::new(ClockConfig::default(), time.clone());
        // Burn the first sequence value so no leaf starts at the initial horizon.
        clock.next_value();
        let root = DomainTreeCache::new(&clock);
        (time, clock, root)
    }

    fn labels(name: &str) -> Vec<String> {
        hostname_labels(name).unwrap()
    }

    fn a(addr: &str) -> Vec<CacheEntry> {
        vec![CacheEntry::new(Record::A(addr.to_string()), 300)]
    }

    fn records(result: Option<Vec<CachedRecord>>) -> Vec<Record> {
        result
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.record)
            .collect()
    }

    #[test]
    fn test_label_path_layout() {
        let (_, clock, root) = setup();
        root.set_result(&labels("www.example.com"), RecordType::A, a("192.0.2.1"));

        assert_eq!(root.child_count(), 1);
        assert_eq!(root.leaf_count(), 0);
        assert!(root
            .get_result(&labels("www.example.com"), RecordType::A, clock.now())
            .is_some());
    }

    #[test]
    fn test_hierarchical_isolation() {
        let (_, clock, root) = setup();
        let now = clock.now();
        root.set_result(&labels("www.example.com"), RecordType::A, a("192.0.2.1"));

        assert!(root.get_result(&labels("example.com"), RecordType::A, now).is_none());
        assert!(root
            .get_result(&labels("mail.example.com"), RecordType::A, now)
            .is_none());
        assert!(root
            .get_result(&labels("www.example.com"), RecordType::AAAA, now)
            .is_none());

        root.set_result(&labels("example.com"), RecordType::MX, vec![]);
        root.set_result(&labels("www.example.com"), RecordType::TXT, vec![
            CacheEntry::new(Record::Txt(vec!["hello".into()]), 300),
        ]);
        assert_eq!(
            records(root.get_result(&labels("www.example.com"), RecordType::A, now)),
            vec![Record::A("192.0.2.1".into())]
        );
    }

    #[test]
    fn test_overwrite_replaces() {
        let (_, clock, root) = setup();
        let name = labels("example.com");
        root.set_result(&name, RecordType::A, a("192.0.2.1"));
        root.set_result(&name, RecordType::A, a("192.0.2.2"));

        assert_eq!(
            records(root.get_result(&name, RecordType::A, clock.now())),
            vec![Record::A("192.0.2.2".into())]
        );
    }

    #[test]
    fn test_empty_write_removes_leaf() {
        let (_, clock, root) = setup();
        let name = labels("example.com");
        root.set_result(&name, RecordType::A, a("192.0.2.1"));
        root.set_result(&name, RecordType::A, Vec::new());
        assert!(root.get_result(&name, RecordType::A, clock.now()).is_none());
    }

    #[test]
    fn test_expired_leaf_reads_as_absent() {
        let (time, clock, root) = setup();
        let name = labels("example.com");
        root.set_result(&name, RecordType::A, a("192.0.2.1"));
        time.advance(Duration::from_secs(301));
        assert!(root.get_result(&name, RecordType::A, clock.now()).is_none());
    }

    #[test]
    fn test_cleanup_prunes_dead_subtrees() {
        let (_, clock, root) = setup();
        root.set_result(&labels("a.example.com"), RecordType::A, a("192.0.2.1"));
        root.set_result(&labels("b.example.org"), RecordType::A, a("192.0.2.2"));
        assert_eq!(root.child_count(), 2);
        assert!(!root.is_empty());

        // Reclaim only the .com leaf: its branch goes, .org survives.
        let horizon = clock.sequence();
        for leaf in node_at(&root, "a.example.com").inner.read().per_type.values() {
            leaf.on_cleanup(horizon);
        }
        root.on_cleanup(horizon);
        assert_eq!(root.child_count(), 1);
        assert!(root
            .get_result(&labels("b.example.org"), RecordType::A, clock.now())
            .is_some());

        for leaf in node_at(&root, "b.example.org").inner.read().per_type.values() {
            leaf.on_cleanup(horizon);
        }
        assert!(root.is_empty());
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn test_clock_broadcasts_empty_a_subtree() {
        let time = Arc::new(ManualTime::new());
        let clock = LogicalClock::new(
            ClockConfig {
                batch_size: 4,
                clean_period: Duration::from_secs(600),
            },
            time,
        );
        let root = DomainTreeCache::new(&clock);
        root.set_result(&labels("www.example.com"), RecordType::A, a("192.0.2.1"));
        root.set_result(&labels("mail.example.com"), RecordType::A, a("192.0.2.2"));
        let example = node_at(&root, "example.com");
        assert!(!example.is_empty());

        for i in 0..12 {
            root.set_result(&labels(&format!("h{i}.example.org")), RecordType::A, a("192.0.2.3"));
            clock.dispatch_pending();
        }

        assert!(example.is_empty());
        assert!(example.is_detached());
        assert!(root
            .get_result(&labels("www.example.com"), RecordType::A, clock.now())
            .is_none());
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn test_write_into_pruned_node_is_redirected() {
        let (_, clock, root) = setup();
        let name = labels("a.example.com");
        root.set_result(&name, RecordType::A, a("192.0.2.1"));
        let stale = node_at(&root, "a.example.com");

        let horizon = clock.sequence();
        for leaf in stale.inner.read().per_type.values() {
            leaf.on_cleanup(horizon);
        }
        assert!(root.is_empty());
        assert!(stale.is_detached());
        assert!(stale
            .try_set_result(&[], RecordType::A, a("192.0.2.9"))
            .is_err());

        root.set_result(&name, RecordType::A, a("192.0.2.9"));
        assert_eq!(
            records(root.get_result(&name, RecordType::A, clock.now())),
            vec![Record::A("192.0.2.9".into())]
        );
        assert!(!Arc::ptr_eq(&stale, &node_at(&root, "a.example.com")));
    }

    #[test]
    fn test_blocked_writer_does_not_hold_ancestors() {
        let (_, clock, root) = setup();
        root.set_result(&labels("b.example.org"), RecordType::A, a("192.0.2.2"));
        root.set_result(&labels("a.example.com"), RecordType::A, a("192.0.2.1"));

        let org = node_at(&root, "example.org");
        let held = org.inner.write();

        let finished = std::thread::scope(|scope| {
            let blocked = {
                let root = Arc::clone(&root);
                scope.spawn(move || {
                    root.set_result(&labels("b.example.org"), RecordType::A, a("192.0.2.3"))
                })
            };
            std::thread::sleep(Duration::from_millis(50));

            let (tx, rx) = std::sync::mpsc::channel();
            let root = Arc::clone(&root);
            scope.spawn(move || {
                root.set_result(&labels("a.example.com"), RecordType::A, a("192.0.2.4"));
                let _ = tx.send(());
            });
            let finished = rx.recv_timeout(Duration::from_secs(5)).is_ok();

            drop(held);
            blocked.join().unwrap();
            finished
        });

        assert!(finished);
        assert_eq!(
            records(root.get_result(&labels("a.example.com"), RecordType::A, clock.now())),
            vec![Record::A("192.0.2.4".into())]
        );
        assert_eq!(
            records(root.get_result(&labels("b.example.org"), RecordType::A, clock.now())),
            vec![Record::A("192.0.2.3".into())]
        );
    }

    fn node_at(root: &Arc<DomainTreeCache>, name: &str) -> Arc<DomainTreeCache> {
        let mut node = Arc::clone(root);
        for label in labels(name) {
            let next = Arc::clone(&node.inner.read().children[&label]);
            node = next;
        }
        node
    }

    #[test]
    fn test_sibling_writers_do_not_interfere() {
        let (_, clock, root) = setup();
        std::thread::scope(|scope| {
            for i in 0..8 {
                let root = Arc::clone(&root);
                scope.spawn(move || {
                    for j in 0..50 {
                        let name = labels(&format!("h{j}.n{i}.example.com"));
                        root.set_result(&name, RecordType::A, a(&format!("10.0.{i}.{j}")));
                        root.set_result(&name, RecordType::TXT, vec![CacheEntry::new(
                            Record::Txt(vec![format!("{i}-{j}")]),
                            300,
                        )]);
                    }
                });
            }
        });

        let now = clock.now();
        for i in 0..8 {
            for j in 0..50 {
                let name = labels(&format!("h{j}.n{i}.example.com"));
                assert_eq!(
                    records(root.get_result(&name, RecordType::A, now)),
                    vec![Record::A(format!("10.0.{i}.{j}"))]
                );
                assert_eq!(
                    records(root.get_result(&name, RecordType::TXT, now)),
                    vec![Record::Txt(vec![format!("{i}-{j}")])]
                );
            }
        }
    }
}
