// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Correlation tracker
//!
//! Registry of outbound requests waiting for a response, each with a deadline.
//! An entry is either matched or timed out, never both: whichever comes first removes the entry
//! under the lock and the other becomes a no-op. Callbacks always run after the lock is released.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

type OnMatch<P> = Box<dyn FnOnce(P) + Send>;
type OnTimeout = Box<dyn FnOnce() + Send>;

struct Pending<P> {
    deadline: Instant,
    on_match: OnMatch<P>,
    on_timeout: OnTimeout,
}

/// Correlation tracker
pub struct CorrelationTracker<K, P> {
    entries: Mutex<HashMap<K, Pending<P>>>,
}

impl<K, P> fmt::Debug for CorrelationTracker<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationTracker")
            .field("pending", &self.lock().len())
            .finish()
    }
}

impl<K, P> Default for CorrelationTracker<K, P> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, P> CorrelationTracker<K, P> {
    /// New empty tracker
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Pending<P>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of pending entries
    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if there are no pending entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Earliest deadline of the pending entries
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock().values().map(|p| p.deadline).min()
    }
}

impl<K, P> CorrelationTracker<K, P>
where
    K: Eq + Hash,
{
    /// Register an entry that times out after `timeout`
    ///
    /// Returns `false`, leaving the existing entry untouched, if `id` is already pending.
    pub fn register<M, T>(&self, id: K, timeout: Duration, on_match: M, on_timeout: T) -> bool
    where
        M: FnOnce(P) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        self.register_with_deadline(id, Instant::now() + timeout, on_match, on_timeout)
    }

    /// Register an entry with an explicit deadline
    ///
    /// Returns `false`, leaving the existing entry untouched, if `id` is already pending.
    pub fn register_with_deadline<M, T>(
        &self,
        id: K,
        deadline: Instant,
        on_match: M,
        on_timeout: T,
    ) -> bool
    where
        M: FnOnce(P) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let mut entries = self.lock();

        if entries.contains_key(&id) {
            return false;
        }

        entries.insert(
            id,
            Pending {
                deadline,
                on_match: Box::new(on_match),
                on_timeout: Box::new(on_timeout),
            },
        );

        true
    }

    /// Check if `id` is pending
    #[inline]
    pub fn contains(&self, id: &K) -> bool {
        self.lock().contains_key(id)
    }

    /// Match an entry, invoking its `on_match` callback exactly once
    ///
    /// Returns `false` if the entry isn't pending (unknown, already matched or timed out).
    pub fn resolve(&self, id: &K, payload: P) -> bool {
        // Release the lock before invoking the callback
        let pending: Option<Pending<P>> = self.lock().remove(id);

        match pending {
            Some(pending) => {
                (pending.on_match)(payload);
                true
            }
            None => false,
        }
    }

    /// Drop an entry without invoking any callback
    #[inline]
    pub fn cancel(&self, id: &K) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Drop all the entries matching the predicate, without invoking any callback
    pub fn cancel_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut entries = self.lock();
        let before: usize = entries.len();
        entries.retain(|id, _| !predicate(id));
        before - entries.len()
    }

    /// Time out all the entries whose deadline is passed
    ///
    /// Returns the number of timed out entries.
    #[inline]
    pub fn tick(&self) -> usize {
        self.tick_at(Instant::now())
    }

    /// Time out all the entries whose deadline is at or before `now`
    pub fn tick_at(&self, now: Instant) -> usize {
        let expired: Vec<Pending<P>> = {
            let mut entries = self.lock();

            let mut expired: Vec<Pending<P>> = Vec::new();
            let mut pending: HashMap<K, Pending<P>> = HashMap::with_capacity(entries.len());

            for (id, entry) in entries.drain() {
                if entry.deadline <= now {
                    expired.push(entry);
                } else {
                    pending.insert(id, entry);
                }
            }

            *entries = pending;
            expired
        };

        let count: usize = expired.len();

        for pending in expired.into_iter() {
            (pending.on_timeout)();
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Default)]
    struct Counters {
        matched: AtomicUsize,
        timed_out: AtomicUsize,
    }

    fn register(
        tracker: &CorrelationTracker<u32, &'static str>,
        id: u32,
        counters: &Arc<Counters>,
    ) -> bool {
        let m = counters.clone();
        let t = counters.clone();
        tracker.register(
            id,
            Duration::from_secs(4),
            move |_| {
                m.matched.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                t.timed_out.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_then_timeout_is_noop() {
        let tracker = CorrelationTracker::new();
        let counters = Arc::new(Counters::default());

        assert!(register(&tracker, 1, &counters));
        assert!(!register(&tracker, 1, &counters));
        assert_eq!(tracker.len(), 1);

        assert!(tracker.resolve(&1, "ok"));
        assert!(!tracker.resolve(&1, "ok"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(tracker.tick(), 0);

        assert_eq!(counters.matched.load(Ordering::SeqCst), 1);
        assert_eq!(counters.timed_out.load(Ordering::SeqCst), 0);
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_resolve_is_noop() {
        let tracker = CorrelationTracker::new();
        let counters = Arc::new(Counters::default());

        register(&tracker, 1, &counters);
        register(&tracker, 2, &counters);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(tracker.tick(), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(tracker.tick(), 2);

        assert!(!tracker.resolve(&1, "late"));
        assert_eq!(counters.matched.load(Ordering::SeqCst), 0);
        assert_eq!(counters.timed_out.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_skips_callbacks() {
        let tracker = CorrelationTracker::new();
        let counters = Arc::new(Counters::default());

        register(&tracker, 1, &counters);
        register(&tracker, 2, &counters);
        register(&tracker, 3, &counters);

        assert!(tracker.cancel(&1));
        assert_eq!(tracker.cancel_where(|id| *id > 1), 2);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(tracker.tick(), 0);
        assert_eq!(counters.timed_out.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_reenter_tracker() {
        let tracker: Arc<CorrelationTracker<u32, ()>> = Arc::new(CorrelationTracker::new());
        let inner = tracker.clone();

        tracker.register(
            1,
            Duration::from_secs(1),
            move |_| {
                // Lock is released while the callback runs
                assert!(!inner.contains(&1));
            },
            || {},
        );

        assert!(tracker.resolve(&1, ()));
    }
}
