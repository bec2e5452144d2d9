//! # Price Cache
//!
//! Short-lived, in-process cache for provider lookups.
//!
//! Each key owns a slot guarded by an async mutex. A caller that finds the
//! slot empty or expired runs the loader while holding the slot, so
//! concurrent callers for the same key wait and then read the freshly
//! stored value instead of hitting the provider again. Keys never block
//! each other.
//!
//! ```text
//!  caller A ──lock(slot "featured")──► load() ──► store ──► unlock
//!  caller B ──lock(slot "featured")──────── wait ─────────► hit
//!  caller C ──lock(slot "urgent")────► load() (independent)
//! ```

use crate::error::PaymentResult;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default time-to-live for cached prices
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(300);

struct Entry<V> {
    value: V,
    loaded_at: Instant,
}

struct Slot<V> {
    entry: Mutex<Option<Entry<V>>>,
    /// Mirrors `entry.is_some()` so counting never waits on a load
    populated: AtomicBool,
    /// Completed load attempts, successful or not
    flights: AtomicU64,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            entry: Mutex::new(None),
            populated: AtomicBool::new(false),
            flights: AtomicU64::new(0),
        }
    }
}

/// Counters exposed on the diagnostics endpoint
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_errors: u64,
    pub stale_serves: u64,
    pub ttl_secs: u64,
}

/// Keyed TTL cache with single-flight loading
pub struct TtlCache<V> {
    slots: RwLock<HashMap<String, Arc<Slot<V>>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_errors: AtomicU64,
    stale_serves: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            load_errors: AtomicU64::new(0),
            stale_serves: AtomicU64::new(0),
        }
    }

    async fn slot(&self, key: &str) -> Arc<Slot<V>> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().await;
        Arc::clone(
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Slot::new())),
        )
    }

    /// Return the cached value for `key`, loading it when absent or expired.
    ///
    /// Failed loads are not cached. When a refresh fails with a transient
    /// error and an expired value is still held, that value is returned
    /// instead of the error, to the loading caller and to every caller that
    /// was queued behind it. A permanent error drops the held value.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> PaymentResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PaymentResult<V>>,
    {
        let slot = self.slot(key).await;
        let flights_seen = slot.flights.load(Ordering::Acquire);
        let mut entry = slot.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached.value.clone());
            }
            // a refresh failed while we queued; share its outcome
            if slot.flights.load(Ordering::Acquire) != flights_seen {
                self.stale_serves.fetch_add(1, Ordering::Relaxed);
                return Ok(cached.value.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, "cache miss, loading");

        let result = load().await;
        slot.flights.fetch_add(1, Ordering::Release);

        match result {
            Ok(value) => {
                self.loads.fetch_add(1, Ordering::Relaxed);
                *entry = Some(Entry {
                    value: value.clone(),
                    loaded_at: Instant::now(),
                });
                slot.populated.store(true, Ordering::Release);
                Ok(value)
            }
            Err(err) => {
                self.load_errors.fetch_add(1, Ordering::Relaxed);
                match entry.as_ref() {
                    Some(stale) if err.is_retryable() => {
                        self.stale_serves.fetch_add(1, Ordering::Relaxed);
                        warn!(key, error = %err, "refresh failed, serving stale value");
                        Ok(stale.value.clone())
                    }
                    _ => {
                        *entry = None;
                        slot.populated.store(false, Ordering::Release);
                        Err(err)
                    }
                }
            }
        }
    }

    /// Drop the value for one key; the next access reloads it
    pub async fn invalidate(&self, key: &str) {
        let slot = self.slots.read().await.get(key).cloned();
        if let Some(slot) = slot {
            *slot.entry.lock().await = None;
            slot.populated.store(false, Ordering::Release);
        }
    }

    /// Drop every cached value
    pub async fn clear(&self) {
        self.slots.write().await.clear();
    }

    /// Number of keys currently holding a value (fresh or stale).
    /// Does not wait for loads in flight.
    pub async fn len(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| slot.populated.load(Ordering::Acquire))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_errors: self.load_errors.load(Ordering::Relaxed),
            stale_serves: self.stale_serves.load(Ordering::Relaxed),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
