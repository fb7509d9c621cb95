//! Single-flight cache for asynchronously fetched values
//!
//! Holds at most one cached value and at most one in-flight fetch per
//! resource key. Every consumer that requests a key while its fetch is
//! in flight attaches to the same operation and receives the same
//! outcome; the value is fetched at most once per process lifetime.
//!
//! # Key states
//!
//! | State | Meaning |
//! |-------|---------|
//! | Empty | No value, no fetch; the next request starts one |
//! | Pending | A fetch is in flight; requests attach to it |
//! | Cached | A value is held; requests answer without I/O |
//!
//! A failed fetch returns the key to Empty, so transient failures
//! self-heal on the next demand without a scheduled retry loop.

use crate::error::{RateviewError, RateviewResult};
use crate::fetch::{FetchError, Fetcher};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Progress of the in-flight fetch for one key
#[derive(Debug, Clone)]
enum FetchPhase<T> {
    InFlight,
    Settled(Result<T, FetchError>),
}

/// A resolved value and the instant it was written
#[derive(Debug, Clone)]
struct CacheSlot<T> {
    value: T,
    resolved_at: DateTime<Utc>,
}

/// Per-key bookkeeping: at most one slot, at most one pending fetch
struct KeyState<T> {
    slot: Option<CacheSlot<T>>,
    pending: Option<watch::Receiver<FetchPhase<T>>>,
}

impl<T> Default for KeyState<T> {
    fn default() -> Self {
        Self {
            slot: None,
            pending: None,
        }
    }
}

/// Cache occupancy counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Keys holding a resolved value
    pub cached: usize,

    /// Keys with a fetch currently in flight
    pub in_flight: usize,
}

/// Outcome of the start-vs-attach decision for one request
enum Lookup<T> {
    Hit(T),
    Wait(watch::Receiver<FetchPhase<T>>),
}

/// Shared single-flight cache, cheap to clone
///
/// All bookkeeping (cache check, attach decision, slot write, pending
/// clear) happens under one lock acquisition with no suspension point
/// inside, so the decision to start or attach is atomic with respect
/// to every other consumer.
pub struct ResourceCache<T> {
    keys: Arc<Mutex<HashMap<String, KeyState<T>>>>,
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> ResourceCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the value for `key`, fetching it if necessary
    ///
    /// Answers from the cache without suspending when a value is held;
    /// attaches to the in-flight fetch when one exists; otherwise
    /// invokes `fetcher` exactly once. The fetch runs as a detached
    /// task, so dropping this future never cancels it and never
    /// affects other callers attached to the same operation.
    pub async fn request<F>(&self, key: &str, fetcher: F) -> RateviewResult<T>
    where
        F: Fetcher<T> + 'static,
    {
        let mut rx = match self.lookup(key, fetcher) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Wait(rx) => rx,
        };

        let outcome = match rx
            .wait_for(|phase| matches!(phase, FetchPhase::Settled(_)))
            .await
        {
            Ok(phase) => match &*phase {
                FetchPhase::Settled(outcome) => outcome.clone(),
                FetchPhase::InFlight => Err(FetchError::Aborted),
            },
            // Sender dropped without settling: the fetch task died.
            Err(_) => Err(FetchError::Aborted),
        };

        outcome.map_err(|source| RateviewError::fetch(key, source))
    }

    /// Read the cached value for `key` without triggering any fetch
    pub fn peek(&self, key: &str) -> Option<T> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.get(key)
            .and_then(|state| state.slot.as_ref())
            .map(|slot| slot.value.clone())
    }

    /// When the cached value for `key` was resolved, if it is cached
    pub fn resolved_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.get(key)
            .and_then(|state| state.slot.as_ref())
            .map(|slot| slot.resolved_at)
    }

    /// Current occupancy counters
    pub fn stats(&self) -> CacheStats {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            cached: keys.values().filter(|s| s.slot.is_some()).count(),
            in_flight: keys.values().filter(|s| s.pending.is_some()).count(),
        }
    }

    /// Drop all cached values and bookkeeping
    ///
    /// A fetch that is in flight during a clear still settles and still
    /// delivers its outcome to attached callers, but the value is not
    /// retained afterwards.
    pub fn clear(&self) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.clear();
    }

    /// The cache-check / start-or-attach decision, in one lock scope
    fn lookup<F>(&self, key: &str, fetcher: F) -> Lookup<T>
    where
        F: Fetcher<T> + 'static,
    {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let state = keys.entry(key.to_string()).or_default();

        if let Some(slot) = &state.slot {
            debug!(key, "cache hit");
            return Lookup::Hit(slot.value.clone());
        }

        if let Some(rx) = &state.pending {
            debug!(key, "attaching to in-flight fetch");
            return Lookup::Wait(rx.clone());
        }

        debug!(key, "cache miss, starting fetch");
        let (tx, rx) = watch::channel(FetchPhase::InFlight);
        state.pending = Some(rx.clone());

        let keys_handle = Arc::clone(&self.keys);
        let key = key.to_string();
        tokio::spawn(async move {
            let outcome = fetcher.fetch().await;
            settle(&keys_handle, &key, &outcome);
            let _ = tx.send(FetchPhase::Settled(outcome));
        });

        Lookup::Wait(rx)
    }
}

/// Apply a settled fetch outcome to the key's bookkeeping
///
/// The slot write and the pending clear happen under the same lock
/// acquisition, so no consumer can observe a key that has both, or a
/// half-written slot.
fn settle<T: Clone>(
    keys: &Mutex<HashMap<String, KeyState<T>>>,
    key: &str,
    outcome: &Result<T, FetchError>,
) {
    let mut keys = keys.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(state) = keys.get_mut(key) else {
        // The cache was cleared while the fetch was in flight.
        return;
    };

    match outcome {
        Ok(value) => {
            state.slot = Some(CacheSlot {
                value: value.clone(),
                resolved_at: Utc::now(),
            });
            debug!(key, "fetch resolved, value cached");
        }
        Err(err) => {
            warn!(key, error = %err, "fetch failed, key left empty");
        }
    }

    // Cleared on success and failure alike; a later miss starts fresh.
    state.pending = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fetch_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::task::yield_now;

    /// Fetcher that counts invocations and blocks until the gate opens
    fn gated_fetcher(
        calls: Arc<AtomicUsize>,
        gate: Arc<Notify>,
        outcome: Result<f64, FetchError>,
    ) -> impl Fetcher<f64> + Clone + 'static {
        fetch_fn(move || {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            let outcome = outcome.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                outcome
            }
        })
    }

    /// Fetcher that counts invocations and settles immediately
    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
        value: f64,
    ) -> impl Fetcher<f64> + Clone + 'static {
        fetch_fn(move || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
        })
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let cache = ResourceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let fetcher = gated_fetcher(Arc::clone(&calls), Arc::clone(&gate), Ok(23_500.0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let cache = cache.clone();
            let fetcher = fetcher.clone();
            handles.push(tokio::spawn(async move {
                cache.request("usd-vnd", fetcher).await
            }));
        }

        // Let every consumer reach the start-or-attach decision before
        // the fetch settles.
        yield_now().await;
        gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 23_500.0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolved_value_served_without_refetching() {
        let cache = ResourceCache::new();
        let first_calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(Arc::clone(&first_calls), 23_500.0);

        assert_eq!(cache.request("usd-vnd", fetcher).await.unwrap(), 23_500.0);

        // A later consumer with its own fetcher never invokes it.
        let later_calls = Arc::new(AtomicUsize::new(0));
        let later = counting_fetcher(Arc::clone(&later_calls), 99_999.0);
        assert_eq!(cache.request("usd-vnd", later).await.unwrap(), 23_500.0);

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.peek("usd-vnd"), Some(23_500.0));
        assert!(cache.resolved_at("usd-vnd").is_some());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_key_eligible_for_retry() {
        let cache = ResourceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let fetcher = fetch_fn({
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(FetchError::Transport("rate service unavailable".to_string()))
                    } else {
                        Ok(24_800.0)
                    }
                }
            }
        });

        let err = cache.request("usd-vnd", fetcher.clone()).await.unwrap_err();
        assert!(matches!(&err, RateviewError::Fetch { .. }));
        assert!(err.is_retryable());
        assert_eq!(cache.peek("usd-vnd"), None);

        assert_eq!(cache.request("usd-vnd", fetcher).await.unwrap(), 24_800.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_fans_out_to_every_waiter() {
        let cache = ResourceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let fetcher = gated_fetcher(
            Arc::clone(&calls),
            Arc::clone(&gate),
            Err(FetchError::Transport("connection reset".to_string())),
        );

        let mut handles = Vec::new();
        for _ in 0..2 {
            let cache = cache.clone();
            let fetcher = fetcher.clone();
            handles.push(tokio::spawn(async move {
                cache.request("usd-vnd", fetcher).await
            }));
        }

        yield_now().await;
        gate.notify_one();

        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek("usd-vnd"), None);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let cache = ResourceCache::new();
        let vnd_calls = Arc::new(AtomicUsize::new(0));
        let thb_calls = Arc::new(AtomicUsize::new(0));

        let vnd = cache
            .request("usd-vnd", counting_fetcher(Arc::clone(&vnd_calls), 25_150.0))
            .await
            .unwrap();
        let thb = cache
            .request("usd-thb", counting_fetcher(Arc::clone(&thb_calls), 35.2))
            .await
            .unwrap();

        assert_eq!(vnd, 25_150.0);
        assert_eq!(thb, 35.2);
        assert_eq!(vnd_calls.load(Ordering::SeqCst), 1);
        assert_eq!(thb_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().cached, 2);
    }

    #[tokio::test]
    async fn clear_forces_a_fresh_fetch() {
        let cache = ResourceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(Arc::clone(&calls), 23_500.0);

        cache.request("usd-vnd", fetcher.clone()).await.unwrap();
        cache.clear();
        assert_eq!(cache.peek("usd-vnd"), None);

        cache.request("usd-vnd", fetcher).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stats_track_slots_and_inflight_fetches() {
        let cache = ResourceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let fetcher = gated_fetcher(Arc::clone(&calls), Arc::clone(&gate), Ok(23_500.0));

        assert_eq!(cache.stats(), CacheStats::default());

        let handle = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.request("usd-vnd", fetcher).await })
        };
        yield_now().await;
        assert_eq!(
            cache.stats(),
            CacheStats {
                cached: 0,
                in_flight: 1
            }
        );

        gate.notify_one();
        handle.await.unwrap().unwrap();
        assert_eq!(
            cache.stats(),
            CacheStats {
                cached: 1,
                in_flight: 0
            }
        );
    }
}
