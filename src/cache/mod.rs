//! In-memory response caching.
//!
//! Responses to GET requests are cached per client so that tree views and
//! hovers stay responsive. Features include:
//! - TTL tiers (short, medium, long) with medium as the default
//! - Namespaced keys so clients sharing a process cannot collide
//! - Entry-count bound with least-recently-used eviction
//! - Substring-pattern invalidation after writes

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace};

use crate::config::CacheSettings;

/// TTL tier for a cacheable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheTtl {
    /// Search results, transitions, sprint contents.
    Short,
    /// Single issues, comments, boards.
    #[default]
    Medium,
    /// Projects, priorities, statuses, link types, creation metadata.
    Long,
    /// Compute the response but do not store it.
    Skip,
    /// An explicit duration. `Duration::ZERO` behaves like `Skip`.
    Custom(Duration),
}

/// A cache entry with metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached response body.
    pub value: Value,
    /// When the entry expires.
    pub expires_at: Instant,
    /// Logical clock of the most recent read or write, for LRU eviction.
    last_used: u64,
}

impl CacheEntry {
    /// Check if the cache entry has expired.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Get the time remaining until expiration.
    pub fn time_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// TTL-keyed response store for one client.
///
/// The lock is only held for the duration of a single map operation and is
/// never held across an `.await`.
#[derive(Debug)]
pub struct ResponseCache {
    namespace: String,
    settings: CacheSettings,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    /// Create a cache whose keys are prefixed with `namespace`.
    pub fn new(namespace: &str, settings: CacheSettings) -> Self {
        Self {
            namespace: namespace.to_string(),
            settings,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// The namespace prefixed to every key.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Build the full cache key for an endpoint.
    pub fn key_for(&self, endpoint: &str) -> String {
        format!("{}:{}", self.namespace, endpoint)
    }

    /// Resolve a tier to a duration. `None` means "do not store".
    pub fn ttl_duration(&self, ttl: CacheTtl) -> Option<Duration> {
        let duration = match ttl {
            CacheTtl::Short => Duration::from_secs(self.settings.short_ttl_secs),
            CacheTtl::Medium => Duration::from_secs(self.settings.medium_ttl_secs),
            CacheTtl::Long => Duration::from_secs(self.settings.long_ttl_secs),
            CacheTtl::Skip => Duration::ZERO,
            CacheTtl::Custom(d) => d,
        };
        (!duration.is_zero()).then_some(duration)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A poisoned lock only means a panic elsewhere mid-update; the map
        // itself is still structurally valid.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get a cached value. Expired entries are treated as absent and dropped.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let now = state.tick();

        let expired = match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.last_used = now;
                let value = entry.value.clone();
                state.hits += 1;
                trace!("Cache hit for {}", key);
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            trace!("Cache expired for {}", key);
            state.entries.remove(key);
        }
        state.misses += 1;
        None
    }

    /// Store a value for `ttl`. A zero TTL stores nothing.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        if ttl.is_zero() || self.settings.max_entries == 0 {
            return;
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        let now = state.tick();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                last_used: now,
            },
        );

        if state.entries.len() > self.settings.max_entries {
            Self::evict(state, self.settings.max_entries);
        }
    }

    /// Drop expired entries first, then least-recently-used ones, until the
    /// map fits within `max_entries`.
    fn evict(state: &mut CacheState, max_entries: usize) {
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired());

        let overflow = state.entries.len().saturating_sub(max_entries);
        if overflow > 0 {
            let mut by_age: Vec<(u64, String)> = state
                .entries
                .iter()
                .map(|(k, e)| (e.last_used, k.clone()))
                .collect();
            by_age.sort_unstable();
            for (_, key) in by_age.into_iter().take(overflow) {
                state.entries.remove(&key);
            }
        }

        let removed = before - state.entries.len();
        state.evictions += removed as u64;
        debug!("Evicted {} cache entries", removed);
    }

    /// Remove every entry whose key contains `pattern`. Returns the count removed.
    pub fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.contains(pattern));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!("Invalidated {} cache entries matching '{}'", removed, pattern);
        }
        removed
    }

    /// Clear all cached data.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        debug!("Cleared response cache '{}'", self.namespace);
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.settings.max_entries,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored (including not yet collected expired ones).
    pub entries: usize,
    /// Maximum number of entries.
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit ratio in percent.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    fn create_test_cache(max_entries: usize) -> ResponseCache {
        ResponseCache::new(
            "jira-server",
            CacheSettings {
                max_entries,
                ..CacheSettings::default()
            },
        )
    }

    #[test]
    fn test_set_then_get() {
        let cache = create_test_cache(10);
        cache.set("k", json!({"key": "PROJ-1"}), Duration::from_millis(1000));
        assert_eq!(cache.get("k"), Some(json!({"key": "PROJ-1"})));
    }

    #[test]
    fn test_entry_expires() {
        let cache = create_test_cache(10);
        cache.set("k", json!(1), Duration::from_millis(30));
        assert!(cache.get("k").is_some());
        thread::sleep(Duration::from_millis(60));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_zero_ttl_not_stored() {
        let cache = create_test_cache(10);
        cache.set("k", json!(1), Duration::ZERO);
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_invalidate_by_pattern_is_scoped() {
        let cache = create_test_cache(10);
        let ttl = Duration::from_secs(60);
        cache.set("ns:/rest/api/2/issue/PROJ-1", json!(1), ttl);
        cache.set("ns:/rest/api/2/issue/PROJ-2", json!(2), ttl);
        cache.set("ns:/rest/api/2/project", json!(3), ttl);
        cache.set("ns:/rest/api/2/priority", json!(4), ttl);

        let removed = cache.invalidate_by_pattern("issue");
        assert_eq!(removed, 2);
        assert!(cache.get("ns:/rest/api/2/issue/PROJ-1").is_none());
        assert!(cache.get("ns:/rest/api/2/project").is_some());
        assert!(cache.get("ns:/rest/api/2/priority").is_some());
    }

    #[test]
    fn test_invalidate_no_match_returns_zero() {
        let cache = create_test_cache(10);
        cache.set("a", json!(1), Duration::from_secs(60));
        assert_eq!(cache.invalidate_by_pattern("zzz"), 0);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = create_test_cache(2);
        let ttl = Duration::from_secs(60);
        cache.set("a", json!("a"), ttl);
        cache.set("b", json!("b"), ttl);
        // Touch "a" so "b" becomes least recently used.
        assert!(cache.get("a").is_some());
        cache.set("c", json!("c"), ttl);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_prefers_expired_entries() {
        let cache = create_test_cache(2);
        cache.set("stale", json!(0), Duration::from_millis(10));
        cache.set("fresh", json!(1), Duration::from_secs(60));
        thread::sleep(Duration::from_millis(30));
        cache.set("newer", json!(2), Duration::from_secs(60));

        assert!(cache.get("fresh").is_some());
        assert!(cache.get("newer").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = create_test_cache(10);
        cache.set("a", json!(1), Duration::from_secs(60));
        cache.clear();
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_key_namespacing() {
        let server = ResponseCache::new("server:work", CacheSettings::default());
        let other = ResponseCache::new("server:home", CacheSettings::default());
        assert_ne!(server.key_for("/project"), other.key_for("/project"));
        assert_eq!(server.key_for("/project"), "server:work:/project");
    }

    #[test]
    fn test_ttl_tiers() {
        let cache = create_test_cache(10);
        assert_eq!(
            cache.ttl_duration(CacheTtl::default()),
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            cache.ttl_duration(CacheTtl::Long),
            Some(Duration::from_secs(1800))
        );
        assert_eq!(cache.ttl_duration(CacheTtl::Skip), None);
        assert_eq!(cache.ttl_duration(CacheTtl::Custom(Duration::ZERO)), None);
    }

    #[test]
    fn test_stats_hit_rate() {
        let cache = create_test_cache(10);
        cache.set("a", json!(1), Duration::from_secs(60));
        cache.get("a");
        cache.get("missing");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[test]
    fn test_entry_time_remaining() {
        let entry = CacheEntry {
            value: json!(null),
            expires_at: Instant::now() + Duration::from_secs(60),
            last_used: 0,
        };
        let remaining = entry.time_remaining();
        assert!(remaining > Duration::from_secs(55));
        assert!(remaining <= Duration::from_secs(60));
    }
}
