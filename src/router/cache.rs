use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    expires_at_utc: DateTime<Utc>,
}

/// Counters for one cache tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    /// Resident entries, including expired ones not yet collected.
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
}

/// String-keyed map whose entries carry an absolute expiry.
///
/// Expiry is strict: no read path returns an entry at or past its deadline.
/// Expired entries are removed lazily on access or by `purge_expired`.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.remove_expired(key, now);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Live value plus its wall-clock expiry, without touching hit counters.
    pub fn peek(&self, key: &str) -> Option<(V, DateTime<Utc>)> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| (entry.value.clone(), entry.expires_at_utc))
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at_utc = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                expires_at_utc,
            },
        );
    }

    /// Evict `key` regardless of expiry. Returns the evicted value if it was
    /// still live.
    pub fn invalidate(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .remove(key)
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(_, entry)| entry.value)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = entry.expires_at > now;
            if !live {
                removed += 1;
            }
            live
        });
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    fn remove_expired(&self, key: &str, now: Instant) {
        // Re-check under the shard lock: a concurrent `set` may have refreshed it.
        if self.entries.remove_if(key, |_, entry| entry.expires_at <= now).is_some() {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
