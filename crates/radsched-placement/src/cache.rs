//! Bounded-staleness caching of data-source snapshots.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::Result;
use crate::latency::LatencyTable;
use crate::store::LatencyProvider;

/// Single-slot snapshot cache.
///
/// A snapshot is served while it is younger than the TTL. A zero TTL
/// disables caching.
#[derive(Debug)]
pub struct SnapshotCache<T> {
    slot: RwLock<Option<CacheEntry<T>>>,
    ttl: Duration,
}

#[derive(Debug)]
struct CacheEntry<T> {
    value: Arc<T>,
    cached_at: Instant,
}

impl<T> SnapshotCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
        }
    }

    /// Maximum age of a served snapshot.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached snapshot if fresh, otherwise loads and caches a new one.
    ///
    /// A failed load leaves the cache untouched and returns the error.
    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        if let Some(value) = self.fresh() {
            return Ok(value);
        }

        let value = load()?;
        if !self.ttl.is_zero() {
            *self.slot.write() = Some(CacheEntry {
                value: value.clone(),
                cached_at: Instant::now(),
            });
        }
        Ok(value)
    }

    /// Drops the cached snapshot.
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    fn fresh(&self) -> Option<Arc<T>> {
        let slot = self.slot.read();
        slot.as_ref()
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }
}

/// Latency provider that serves snapshots up to a TTL old.
#[derive(Debug)]
pub struct CachedLatencyProvider<P> {
    inner: P,
    cache: SnapshotCache<LatencyTable>,
}

impl<P: LatencyProvider> CachedLatencyProvider<P> {
    /// Wraps a provider.
    #[must_use]
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: SnapshotCache::new(ttl),
        }
    }

    /// Drops the cached snapshot so the next read goes to the inner provider.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}

impl<P: LatencyProvider> LatencyProvider for CachedLatencyProvider<P> {
    fn latency_table(&self) -> Result<Arc<LatencyTable>> {
        self.cache.get_or_load(|| {
            debug!(ttl_secs = self.cache.ttl().as_secs(), "Refreshing latency snapshot");
            self.inner.latency_table()
        })
    }
}
