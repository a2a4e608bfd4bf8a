//! Bounded chunk cache over decompressed byte ranges.
//!
//! Region queries repeatedly touch the same compressed chunks (panning a
//! view re-reads the neighboring blocks), so decompressed ranges are kept
//! in a small LRU keyed by the virtual-offset pair that designated them.
//!
//! # Coalescing
//!
//! Concurrent queries for the same key share a single in-flight fetch: the
//! first caller decompresses, later callers wait on the flight and clone
//! the shared [`Bytes`] result. A waiter whose cancellation token fires
//! returns immediately with [`MafqError::Cancelled`] — it does not cancel
//! the fetch, because other callers (or a later query) may still want the
//! value.
//!
//! # Memory
//!
//! Capacity is 50 entries. With ~64-128 KB decompressed chunks that bounds
//! the cache at a few MB regardless of how many queries run.

use bytes::Bytes;
use log::debug;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{MafqError, Result};
use crate::formats::index::VirtualOffset;
use crate::query::CancelToken;

/// Default cache capacity, in entries.
pub const DEFAULT_CHUNK_CAPACITY: usize = 50;

/// How long a waiter sleeps between cancellation checks.
const WAIT_SLICE: Duration = Duration::from_millis(20);

/// Cache key: the virtual-offset pair designating one decompressed range.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct ChunkKey {
    /// Virtual offset of the first block of the range
    pub start: VirtualOffset,
    /// Virtual offset of the entry one past the range
    pub end: VirtualOffset,
}

/// One in-flight fetch, shared between the producer and any waiters.
///
/// Errors are stored as strings: the producer returns its own error
/// unmodified, waiters see a `Compression` error wrapping the message.
struct Flight {
    done: Mutex<Option<std::result::Result<Bytes, String>>>,
    cond: Condvar,
}

struct CacheState {
    lru: LruCache<ChunkKey, Bytes>,
    in_flight: HashMap<ChunkKey, Arc<Flight>>,
}

/// Bounded, coalescing LRU over decompressed chunks.
pub struct ChunkCache {
    state: Mutex<CacheState>,
}

impl ChunkCache {
    /// Cache with the default capacity of 50 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHUNK_CAPACITY)
    }

    /// Cache with a custom entry capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        ChunkCache {
            state: Mutex::new(CacheState {
                lru: LruCache::new(capacity),
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Look up `key`, running `fetch` on a miss. Concurrent callers for
    /// the same key share one fetch.
    ///
    /// `cancel` gates only this caller: a cancelled waiter returns
    /// [`MafqError::Cancelled`] while the fetch completes for everyone
    /// else.
    pub fn get_or_fetch<F>(&self, key: ChunkKey, cancel: &CancelToken, fetch: F) -> Result<Bytes>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        let flight = {
            let mut state = self.state.lock().unwrap();
            if let Some(bytes) = state.lru.get(&key) {
                debug!("chunk cache hit at {:?}", key.start);
                return Ok(bytes.clone());
            }
            if let Some(flight) = state.in_flight.get(&key) {
                debug!("chunk cache coalescing onto in-flight fetch");
                let flight = flight.clone();
                drop(state);
                return self.wait_for(flight, cancel);
            }
            let flight = Arc::new(Flight {
                done: Mutex::new(None),
                cond: Condvar::new(),
            });
            state.in_flight.insert(key, flight.clone());
            flight
        };

        debug!("chunk cache miss at {:?}", key.start);
        let result = fetch();

        let mut state = self.state.lock().unwrap();
        state.in_flight.remove(&key);
        let (to_store, out) = match result {
            Ok(data) => {
                let bytes = Bytes::from(data);
                state.lru.put(key, bytes.clone());
                (Ok(bytes.clone()), Ok(bytes))
            }
            Err(e) => (Err(e.to_string()), Err(e)),
        };
        drop(state);

        *flight.done.lock().unwrap() = Some(to_store);
        flight.cond.notify_all();
        out
    }

    /// Number of cached entries (test hook).
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().lru.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn wait_for(&self, flight: Arc<Flight>, cancel: &CancelToken) -> Result<Bytes> {
        let mut done = flight.done.lock().unwrap();
        loop {
            if let Some(result) = done.as_ref() {
                return match result {
                    Ok(bytes) => Ok(bytes.clone()),
                    Err(msg) => Err(MafqError::Compression(format!(
                        "shared fetch failed: {}",
                        msg
                    ))),
                };
            }
            if cancel.is_cancelled() {
                return Err(MafqError::Cancelled);
            }
            let (guard, _timeout) = flight.cond.wait_timeout(done, WAIT_SLICE).unwrap();
            done = guard;
        }
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(start: u64, end: u64) -> ChunkKey {
        ChunkKey {
            start: VirtualOffset::from_raw(start),
            end: VirtualOffset::from_raw(end),
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = ChunkCache::new();
        let token = CancelToken::new();
        let calls = AtomicUsize::new(0);

        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1, 2, 3])
        };
        let a = cache.get_or_fetch(key(0, 1), &token, fetch).unwrap();
        let b = cache
            .get_or_fetch(key(0, 1), &token, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![9, 9, 9])
            })
            .unwrap();

        assert_eq!(a.as_ref(), &[1, 2, 3]);
        assert_eq!(b.as_ref(), &[1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let cache = ChunkCache::with_capacity(2);
        let token = CancelToken::new();
        for i in 0..3 {
            cache
                .get_or_fetch(key(i, i + 1), &token, || Ok(vec![i as u8]))
                .unwrap();
        }
        assert_eq!(cache.len(), 2);
        // Key 0 was evicted: fetching it again runs the closure.
        let refetched = AtomicUsize::new(0);
        cache
            .get_or_fetch(key(0, 1), &token, || {
                refetched.fetch_add(1, Ordering::SeqCst);
                Ok(vec![0])
            })
            .unwrap();
        assert_eq!(refetched.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_error_is_not_cached() {
        let cache = ChunkCache::new();
        let token = CancelToken::new();
        let err = cache.get_or_fetch(key(0, 1), &token, || {
            Err(MafqError::Compression("boom".to_string()))
        });
        assert!(err.is_err());
        assert!(cache.is_empty());

        // A later fetch retries and succeeds.
        let ok = cache.get_or_fetch(key(0, 1), &token, || Ok(vec![7]));
        assert_eq!(ok.unwrap().as_ref(), &[7]);
    }

    #[test]
    fn test_concurrent_fetches_coalesce() {
        use std::sync::Barrier;

        let cache = Arc::new(ChunkCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let token = CancelToken::new();
                    barrier.wait();
                    cache
                        .get_or_fetch(key(0, 1), &token, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Hold the flight open long enough for the
                            // other threads to pile on.
                            std::thread::sleep(Duration::from_millis(50));
                            Ok(vec![42])
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().as_ref(), &[42]);
        }
        // At most one thread ran the fetch; the others coalesced. (The
        // barrier makes a duplicate fetch overwhelmingly unlikely, but a
        // thread that arrives after completion would legitimately hit the
        // LRU instead.)
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_waiter_does_not_cancel_fetch() {
        let cache = Arc::new(ChunkCache::new());
        let waiter_token = CancelToken::new();
        waiter_token.cancel();

        // Producer thread holds the flight open.
        let producer_cache = cache.clone();
        let producer = std::thread::spawn(move || {
            let token = CancelToken::new();
            producer_cache.get_or_fetch(key(0, 1), &token, || {
                std::thread::sleep(Duration::from_millis(100));
                Ok(vec![5])
            })
        });

        // Give the producer time to register the flight, then join it as
        // a cancelled waiter.
        std::thread::sleep(Duration::from_millis(30));
        let waited = cache.get_or_fetch(key(0, 1), &waiter_token, || Ok(vec![0]));
        assert!(matches!(waited, Err(MafqError::Cancelled)));

        // The producer still completes and the value lands in the cache.
        assert_eq!(producer.join().unwrap().unwrap().as_ref(), &[5]);
        assert_eq!(cache.len(), 1);
    }
}
