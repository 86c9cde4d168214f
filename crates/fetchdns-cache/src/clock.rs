//! Logical clock and cleanup broadcasts.
//!
//! Every leaf created in the cache draws a sequence number from the clock.
//! Every `batch_size` numbers, or once `clean_period` has elapsed since the
//! last broadcast, the clock announces a new *horizon*: entries created at
//! or below it are stale and may be reclaimed.
//!
//! Subscriptions are one-shot. A broadcast is delivered to each listener
//! registered at the time it was issued, exactly once, and the registry is
//! emptied; listeners that still hold data subscribe again. The clock only
//! keeps [`Weak`] references, so dropping a cache node is enough to
//! unsubscribe it.
//!
//! Delivery is deferred. A broadcast is queued by [`LogicalClock::next_value`]
//! and delivered by [`LogicalClock::dispatch_pending`], which is spawned onto
//! the current Tokio runtime when there is one and is otherwise run by the
//! cache at the start of its next operation.

use crate::time::TimeSource;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Clock configuration.
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// Number of sequence values between broadcasts.
    pub batch_size: u64,

    /// Maximum wall-clock time between broadcasts.
    pub clean_period: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            clean_period: Duration::from_secs(600),
        }
    }
}

/// Receiver of cleanup broadcasts.
pub trait CleanupListener: Send + Sync {
    /// Called once per broadcast the listener was subscribed to.
    fn on_cleanup(&self, horizon: i64);
}

struct Broadcast {
    horizon: i64,
    listeners: Vec<Weak<dyn CleanupListener>>,
}

struct ClockState {
    sequence: i64,
    horizon: i64,
    last_cleaned: Instant,
    listeners: Vec<Weak<dyn CleanupListener>>,
    pending: Vec<Broadcast>,
}

/// Process-scoped sequence generator that schedules cleanup broadcasts.
pub struct LogicalClock {
    config: ClockConfig,
    time: Arc<dyn TimeSource>,
    state: Mutex<ClockState>,
    me: Weak<LogicalClock>,
}

impl LogicalClock {
    /// Creates a new clock.
    pub fn new(config: ClockConfig, time: Arc<dyn TimeSource>) -> Arc<Self> {
        let now = time.now();
        Arc::new_cyclic(|me| Self {
            config: ClockConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            time,
            state: Mutex::new(ClockState {
                sequence: i64::MIN,
                horizon: i64::MIN,
                last_cleaned: now,
                listeners: Vec::new(),
                pending: Vec::new(),
            }),
            me: me.clone(),
        })
    }

    /// Returns the current instant of the clock's time source.
    pub fn now(&self) -> Instant {
        self.time.now()
    }

    /// Returns the clock configuration.
    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Issues the next sequence value.
    ///
    /// Before incrementing, decides whether a cleanup broadcast is due. When
    /// the sequence has reached `i64::MAX`, every issued value is declared
    /// stale and both counters restart at `i64::MIN`.
    pub fn next_value(&self) -> i64 {
        let now = self.time.now();
        let mut state = self.state.lock();
        let mut scheduled = false;

        if state.sequence == i64::MAX {
            debug!("Sequence exhausted, resetting logical clock");
            state.horizon = i64::MAX;
            Self::schedule(&mut state, i64::MAX);
            state.sequence = i64::MIN;
            state.horizon = i64::MIN;
            state.last_cleaned = now;
            scheduled = true;
        } else if self.broadcast_due(&state, now) {
            let horizon = state
                .sequence
                .saturating_sub(self.batch_size_i64())
                .max(state.horizon);
            state.horizon = horizon;
            Self::schedule(&mut state, horizon);
            state.last_cleaned = now;
            scheduled = true;
        }

        let value = state.sequence;
        state.sequence += 1;
        drop(state);

        if scheduled {
            self.spawn_dispatch();
        }

        value
    }

    /// Registers a listener for the next broadcast.
    pub fn subscribe(&self, listener: Weak<dyn CleanupListener>) {
        self.state.lock().listeners.push(listener);
    }

    /// Delivers all queued broadcasts and returns how many listeners were
    /// reached.
    pub fn dispatch_pending(&self) -> usize {
        let pending = std::mem::take(&mut self.state.lock().pending);
        let mut delivered = 0;

        for broadcast in pending {
            debug!(
                horizon = broadcast.horizon,
                listeners = broadcast.listeners.len(),
                "Delivering cleanup broadcast"
            );
            for listener in broadcast.listeners {
                if let Some(listener) = listener.upgrade() {
                    listener.on_cleanup(broadcast.horizon);
                    delivered += 1;
                }
            }
        }

        delivered
    }

    /// Returns the horizon of the most recent broadcast.
    pub fn horizon(&self) -> i64 {
        self.state.lock().horizon
    }

    /// Returns the next value to be issued.
    pub fn sequence(&self) -> i64 {
        self.state.lock().sequence
    }

    /// Returns the number of listeners waiting for the next broadcast.
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Returns the number of broadcasts not yet delivered.
    pub fn pending_broadcasts(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn batch_size_i64(&self) -> i64 {
        i64::try_from(self.config.batch_size).unwrap_or(i64::MAX)
    }

    fn broadcast_due(&self, state: &ClockState, now: Instant) -> bool {
        state.sequence.rem_euclid(self.batch_size_i64()) == 0
            || now.saturating_duration_since(state.last_cleaned) > self.config.clean_period
    }

    fn schedule(state: &mut ClockState, horizon: i64) {
        let listeners = std::mem::take(&mut state.listeners);
        trace!(horizon, listeners = listeners.len(), "Scheduling cleanup broadcast");
        state.pending.push(Broadcast { horizon, listeners });
    }

    fn spawn_dispatch(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if let Some(clock) = self.me.upgrade() {
            handle.spawn(async move {
                clock.dispatch_pending();
            });
        }
    }
}

impl fmt::Debug for LogicalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LogicalClock")
            .field("config", &self.config)
            .field("sequence", &state.sequence)
            .field("horizon", &state.horizon)
            .field("listeners", &state.listeners.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        calls: AtomicUsize,
        last: Mutex<Option<i64>>,
    }

    impl CleanupListener for Recorder {
        fn on_cleanup(&self, horizon: i64) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock() = Some(horizon);
        }
    }

    fn clock(batch_size: u64, time: Arc<ManualTime>) -> Arc<LogicalClock> {
        LogicalClock::new(
            ClockConfig {
                batch_size,
                clean_period: Duration::from_secs(600),
            },
            time,
        )
    }

    fn subscribe(clock: &LogicalClock, listener: &Arc<Recorder>) {
        let weak: Weak<dyn CleanupListener> = Arc::downgrade(listener) as Weak<dyn CleanupListener>;
        clock.subscribe(weak);
    }

    #[test]
    fn test_sequence_is_strictly_increasing() {
        let clock = clock(1000, Arc::new(ManualTime::new()));
        let a = clock.next_value();
        let b = clock.next_value();
        let c = clock.next_value();
        assert_eq!(a, i64::MIN);
        assert!(a < b && b < c);
        assert!(clock.horizon() <= clock.sequence());
    }

    #[test]
    fn test_batch_broadcast_is_deferred() {
        let clock = clock(4, Arc::new(ManualTime::new()));
        // i64::MIN is a multiple of 4, so the first call schedules a broadcast.
        clock.next_value();
        for _ in 0..3 {
            clock.next_value();
        }
        let listener = Arc::new(Recorder::default());
        subscribe(&clock, &listener);

        // sequence is now MIN + 4
        clock.next_value();
        assert_eq!(listener.calls.load(Ordering::SeqCst), 0);
        assert_eq!(clock.pending_broadcasts(), 2);

        assert_eq!(clock.dispatch_pending(), 1);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*listener.last.lock(), Some(i64::MIN));
        assert_eq!(clock.listener_count(), 0);
    }

    #[test]
    fn test_subscriptions_are_one_shot() {
        let clock = clock(2, Arc::new(ManualTime::new()));
        let listener = Arc::new(Recorder::default());
        subscribe(&clock, &listener);

        for _ in 0..6 {
            clock.next_value();
        }
        clock.dispatch_pending();
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_horizon_trails_sequence_by_batch() {
        let clock = clock(4, Arc::new(ManualTime::new()));
        for _ in 0..9 {
            clock.next_value();
        }
        // Broadcasts at MIN, MIN + 4 and MIN + 8.
        assert_eq!(clock.horizon(), i64::MIN + 4);
        assert_eq!(clock.sequence(), i64::MIN + 9);
    }

    #[test]
    fn test_period_broadcast() {
        let time = Arc::new(ManualTime::new());
        let clock = clock(1000, time.clone());
        clock.next_value();
        clock.next_value();
        clock.dispatch_pending();

        let listener = Arc::new(Recorder::default());
        subscribe(&clock, &listener);

        clock.next_value();
        assert_eq!(clock.pending_broadcasts(), 0);

        time.advance(Duration::from_secs(601));
        clock.next_value();
        assert_eq!(clock.pending_broadcasts(), 1);
        clock.dispatch_pending();
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_overflow_resets_everything() {
        let clock = clock(1000, Arc::new(ManualTime::new()));
        {
            let mut state = clock.state.lock();
            state.sequence = i64::MAX;
            state.horizon = i64::MAX - 5000;
        }
        let listener = Arc::new(Recorder::default());
        subscribe(&clock, &listener);

        let value = clock.next_value();
        assert_eq!(value, i64::MIN);
        assert_eq!(clock.sequence(), i64::MIN + 1);
        assert_eq!(clock.horizon(), i64::MIN);

        clock.dispatch_pending();
        assert_eq!(*listener.last.lock(), Some(i64::MAX));
    }

    #[test]
    fn test_dropped_listeners_are_skipped() {
        let clock = clock(1, Arc::new(ManualTime::new()));
        let listener = Arc::new(Recorder::default());
        subscribe(&clock, &listener);
        drop(listener);

        clock.next_value();
        assert_eq!(clock.dispatch_pending(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_is_spawned_on_runtime() {
        let clock = clock(1, Arc::new(ManualTime::new()));
        let listener = Arc::new(Recorder::default());
        subscribe(&clock, &listener);

        clock.next_value();
        assert_eq!(listener.calls.load(Ordering::SeqCst), 0);

        for _ in 0..10 {
            if listener.calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }
}
