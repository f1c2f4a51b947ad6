use crate::error::{BackendError, CacheError};
use futures::future::{BoxFuture, FutureExt, WeakShared};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

type ComputeFuture<V> = BoxFuture<'static, Result<V, CacheError>>;

/// Content-addressed cache key: whitespace-collapsed, lowercased input
/// hashed with SHA-256. Identical logical inputs map to the same key even
/// when their formatting differs.
pub fn content_key(input: &str) -> String {
    let normalized = input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

struct ReadyEntry<V> {
    value: V,
    created_at: Instant,
    last_used: Instant,
}

struct Inner<V> {
    ready: HashMap<String, ReadyEntry<V>>,
    // Weak handles: the computation lives in its waiters, so cancelling the
    // last waiter drops it. A dead entry is replaced on the next lookup.
    pending: HashMap<String, WeakShared<ComputeFuture<V>>>,
}

impl<V> Inner<V> {
    /// Drop least-recently-used entries until within capacity.
    fn evict_over_capacity(&mut self, capacity: usize) {
        while self.ready.len() > capacity {
            let coldest = self
                .ready
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match coldest {
                Some(key) => {
                    self.ready.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

/// Bounded TTL cache with single-flight computation.
///
/// Concurrent `get_or_compute` calls for the same key share one in-flight
/// computation through a [`futures::future::Shared`]: the work keeps
/// running as long as any waiter remains, and is dropped when the last
/// waiter goes away. Failures propagate to every waiter and are never
/// cached.
pub struct SingleFlightCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> SingleFlightCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                ready: HashMap::new(),
                pending: HashMap::new(),
            })),
            capacity: capacity.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or run `compute` exactly once
    /// across all concurrent callers and cache its result.
    pub async fn get_or_compute<F>(&self, key: &str, compute: F) -> Result<V, CacheError>
    where
        F: Future<Output = Result<V, BackendError>> + Send + 'static,
    {
        let shared = {
            let mut inner = self.inner.lock().await;

            if let Some(entry) = inner.ready.get_mut(key) {
                if entry.created_at.elapsed() < self.ttl {
                    entry.last_used = Instant::now();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.value.clone());
                }
                inner.ready.remove(key);
            }

            if let Some(pending) = inner.pending.get(key).and_then(WeakShared::upgrade) {
                // Join the in-flight computation instead of duplicating it.
                self.hits.fetch_add(1, Ordering::Relaxed);
                pending
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let store = Arc::clone(&self.inner);
                let owned_key = key.to_string();
                let capacity = self.capacity;
                let fut = async move {
                    let result = compute.await.map_err(|e| CacheError::from_backend(&e));
                    let mut inner = store.lock().await;
                    inner.pending.remove(&owned_key);
                    if let Ok(value) = &result {
                        let now = Instant::now();
                        inner.ready.insert(
                            owned_key,
                            ReadyEntry {
                                value: value.clone(),
                                created_at: now,
                                last_used: now,
                            },
                        );
                        inner.evict_over_capacity(capacity);
                    }
                    result
                }
                .boxed()
                .shared();
                if let Some(weak) = fut.downgrade() {
                    inner.pending.insert(key.to_string(), weak);
                }
                fut
            }
        };

        shared.await
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: inner.ready.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::{advance, sleep};

    fn counted_compute(
        calls: Arc<AtomicU32>,
        value: u32,
    ) -> impl Future<Output = Result<u32, BackendError>> + Send + 'static {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(50)).await;
            Ok(value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_runs_compute_once() {
        let cache = Arc::new(SingleFlightCache::new(8, Duration::from_secs(60)));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache.get_or_compute("k", counted_compute(calls, 7)).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expires_entries() {
        let ttl = Duration::from_secs(30);
        let cache = SingleFlightCache::new(8, ttl);
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .get_or_compute("k", counted_compute(calls.clone(), 1))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Hit just before expiry.
        advance(ttl - Duration::from_millis(51)).await;
        cache
            .get_or_compute("k", counted_compute(calls.clone(), 2))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Miss just after expiry.
        advance(Duration::from_millis(52)).await;
        let v = cache
            .get_or_compute("k", counted_compute(calls.clone(), 2))
            .await
            .unwrap();
        assert_eq!(v, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn lru_eviction_respects_recency() {
        let cache = SingleFlightCache::new(2, Duration::from_secs(300));
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .get_or_compute("a", counted_compute(calls.clone(), 1))
            .await
            .unwrap();
        advance(Duration::from_millis(10)).await;
        cache
            .get_or_compute("b", counted_compute(calls.clone(), 2))
            .await
            .unwrap();
        advance(Duration::from_millis(10)).await;

        // Touch "a" so "b" becomes the LRU victim.
        cache
            .get_or_compute("a", counted_compute(calls.clone(), 1))
            .await
            .unwrap();
        advance(Duration::from_millis(10)).await;
        cache
            .get_or_compute("c", counted_compute(calls.clone(), 3))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // "a" survived, "b" was evicted and recomputes.
        cache
            .get_or_compute("a", counted_compute(calls.clone(), 1))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        cache
            .get_or_compute("b", counted_compute(calls.clone(), 2))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_sole_waiter_drops_the_computation() {
        let cache = Arc::new(SingleFlightCache::new(8, Duration::from_secs(60)));
        let calls = Arc::new(AtomicU32::new(0));

        let waiter = {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache.get_or_compute("k", counted_compute(calls, 1)).await
            })
        };
        // Let the waiter start its computation, then cancel it mid-flight.
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        waiter.abort();
        let _ = waiter.await;

        // The abandoned flight is gone: a fresh compute runs and its value
        // wins, not the stale one.
        let v = cache
            .get_or_compute("k", counted_compute(calls.clone(), 2))
            .await
            .unwrap();
        assert_eq!(v, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reaches_all_waiters_and_is_not_cached() {
        let cache = Arc::new(SingleFlightCache::<u32>::new(8, Duration::from_secs(60)));
        let calls = Arc::new(AtomicU32::new(0));

        let failing = |calls: Arc<AtomicU32>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            Err::<u32, _>(BackendError::Unavailable("down".into()))
        };

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache.get_or_compute("k", failing(calls)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // No negative caching: the next call recomputes and can succeed.
        let v = cache
            .get_or_compute("k", counted_compute(calls.clone(), 9))
            .await
            .unwrap();
        assert_eq!(v, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_track_hits_and_misses() {
        let cache = SingleFlightCache::new(8, Duration::from_secs(60));
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .get_or_compute("k", counted_compute(calls.clone(), 1))
            .await
            .unwrap();
        cache
            .get_or_compute("k", counted_compute(calls.clone(), 1))
            .await
            .unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn content_key_normalizes_input() {
        assert_eq!(content_key("Apache  502\nerrors"), content_key("apache 502 errors"));
        assert_ne!(content_key("apache 502"), content_key("nginx 502"));
    }
}
