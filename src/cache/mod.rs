//! Response cache with TTL expiry and recency eviction.
//!
//! Entries are keyed by [`cache_key`], a sha256 over the normalized request.
//! Expired entries are dropped lazily when read; capacity overflow evicts the
//! least recently inserted or accessed entry.

use crate::agent::Turn;
use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
    pub hit_rate: f64,
}

/// Process-local key/value store with TTL and bounded capacity.
pub struct ResponseCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ResponseCache<V> {
    /// `capacity` is clamped to at least one entry.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the live value for `key`, refreshing its recency.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();

        let expired = match entries.peek(key) {
            Some(entry) => entry.expires_at <= now,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let entry = entries.get(key)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            age_ms = now.duration_since(entry.created_at).as_millis() as u64,
            "cache hit"
        );
        Some(entry.value.clone())
    }

    /// Insert or replace `key`, evicting the least recent entry when full.
    pub fn set(&self, key: String, value: V) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now + self.ttl,
        };
        if let Some((evicted, _)) = self.lock().push(key.clone(), entry) {
            if evicted != key {
                tracing::trace!("cache full, evicted least recent entry");
            }
        }
    }

    /// Drop every entry and zero the counters.
    pub fn clear(&self) {
        self.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Resident entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            size: self.len(),
            capacity: self.lock().cap().get(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hash_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

/// Stable hex digest of a request.
///
/// Whitespace runs are collapsed and ends trimmed before hashing. Every field
/// is length-prefixed so that shifting text between turns changes the key.
pub fn cache_key(history: &[Turn], text: &str, backend: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update((history.len() as u64).to_le_bytes());
    for turn in history {
        hash_field(&mut hasher, turn.role.as_str());
        hash_field(&mut hasher, &normalize(&turn.text));
    }
    hash_field(&mut hasher, &normalize(text));
    match backend {
        Some(id) => {
            hasher.update([1u8]);
            hash_field(&mut hasher, id);
        }
        None => hasher.update([0u8]),
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> ResponseCache<String> {
        ResponseCache::new(Duration::from_secs(60), capacity)
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_returns_value() {
        let cache = cache(10);
        cache.set("k".to_string(), "v".to_string());

        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_ttl_is_miss_and_removes_entry() {
        let cache = cache(10);
        cache.set("k".to_string(), "v".to_string());

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_bound() {
        let cache = cache(3);
        for i in 0..4 {
            cache.set(format!("k{}", i), i.to_string());
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("k0"), None);
        assert_eq!(cache.get("k3"), Some("3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_refreshes_recency() {
        let cache = cache(2);
        cache.set("a".to_string(), "1".to_string());
        cache.set("b".to_string(), "2".to_string());

        // touch "a" so "b" becomes the eviction victim
        assert!(cache.get("a").is_some());
        cache.set("c".to_string(), "3".to_string());

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_evict_others() {
        let cache = cache(2);
        cache.set("a".to_string(), "1".to_string());
        cache.set("b".to_string(), "2".to_string());
        cache.set("a".to_string(), "3".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some("3".to_string()));
        assert_eq!(cache.get("b"), Some("2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_capacity_holds_one_entry() {
        let cache = cache(0);
        cache.set("a".to_string(), "1".to_string());
        cache.set("b".to_string(), "2".to_string());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().capacity, 1);
        assert_eq!(cache.get("b"), Some("2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_dropped_on_read_keeps_live_entries() {
        let cache = ResponseCache::new(Duration::from_secs(10), 2);
        cache.set("old".to_string(), "1".to_string());
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.set("new".to_string(), "2".to_string());
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.get("old"), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some("2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_entries_and_counters() {
        let cache = cache(4);
        cache.set("a".to_string(), "1".to_string());
        let _ = cache.get("a");
        let _ = cache.get("missing");

        cache.clear();

        let stats = cache.stats();
        assert!(cache.is_empty());
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_cache_key_is_deterministic_and_normalized() {
        let history = vec![Turn::user("hello"), Turn::assistant("hi there")];
        let a = cache_key(&history, "  what   is rust? ", None);
        let b = cache_key(&history, "what is rust?", None);

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_cache_key_distinguishes_content() {
        let history = vec![Turn::user("hello")];
        let base = cache_key(&history, "question", None);

        assert_ne!(base, cache_key(&history, "question!", None));
        assert_ne!(base, cache_key(&[], "question", None));
        assert_ne!(base, cache_key(&history, "question", Some("gpt-mini")));
        assert_ne!(
            cache_key(&[Turn::user("ab")], "c", None),
            cache_key(&[Turn::user("a")], "bc", None)
        );
        assert_ne!(
            cache_key(&[Turn::user("x")], "q", None),
            cache_key(&[Turn::assistant("x")], "q", None)
        );
    }
}
