//! Bounded cache for template lookups.
//!
//! Keys are composite: an ordered list of string parts joined with a reserved
//! delimiter by [`cache_key`]. Values are [`CacheEntry`] items, where
//! [`CacheEntry::Missing`] records a lookup that resolved to nothing. A `None`
//! from [`Cache::get`] always means "not computed yet".

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

/// Reserved delimiter between composite key parts.
pub const KEY_DELIMITER: char = '\u{1f}';

/// Default maximum weight when caching is switched on without a size.
pub const DEFAULT_MAX_WEIGHT: usize = 10_000;

/// Encode a composite key.
pub fn cache_key<S: AsRef<str>>(parts: &[S]) -> String {
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(KEY_DELIMITER);
        }
        key.push_str(part.as_ref());
    }
    key
}

/// A cached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// A resolved template file.
    Path(PathBuf),
    /// An enumerated, sorted file list. Shared, never mutated.
    Files(Arc<Vec<PathBuf>>),
    /// Negative sentinel: looked up and found nothing.
    Missing,
}

/// Weight function used by [`LruCache`].
pub type Weigher = fn(&CacheEntry) -> usize;

/// File lists weigh their length, everything else weighs one.
pub fn default_weigher(entry: &CacheEntry) -> usize {
    match entry {
        CacheEntry::Files(files) => files.len().max(1),
        _ => 1,
    }
}

/// Storage contract the engine needs from a cache.
pub trait Cache: Send + Sync {
    /// Retrieve a cached entry.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store an entry.
    fn set(&self, key: &str, value: CacheEntry);
}

/// A cache that stores nothing. Used when caching is disabled.
#[derive(Debug, Default)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &str) -> Option<CacheEntry> {
        None
    }

    fn set(&self, _key: &str, _value: CacheEntry) {}
}

/// Configuration for [`LruCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Total weight allowed before eviction kicks in.
    pub max_weight: usize,

    /// Size function for entries.
    pub weigher: Weigher,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_weight: DEFAULT_MAX_WEIGHT,
            weigher: default_weigher,
        }
    }
}

impl CacheConfig {
    /// Create a config with the given maximum weight.
    pub fn with_max_weight(mut self, max_weight: usize) -> Self {
        self.max_weight = max_weight;
        self
    }

    /// Use a custom size function.
    pub fn with_weigher(mut self, weigher: Weigher) -> Self {
        self.weigher = weigher;
        self
    }
}

impl PartialEq for CacheConfig {
    fn eq(&self, other: &Self) -> bool {
        self.max_weight == other.max_weight && self.weigher as usize == other.weigher as usize
    }
}

struct Slot {
    value: CacheEntry,
    weight: usize,
    last_used: AtomicU64,
}

/// Weight-bounded, least-recently-used cache.
pub struct LruCache {
    storage: DashMap<String, Slot>,
    config: CacheConfig,
    weight: AtomicUsize,
    clock: AtomicU64,
}

impl LruCache {
    /// Create a new cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            storage: DashMap::new(),
            config,
            weight: AtomicUsize::new(0),
            clock: AtomicU64::new(0),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Current total weight.
    pub fn weight(&self) -> usize {
        self.weight.load(Ordering::Relaxed)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn evict(&self) {
        while self.weight() > self.config.max_weight {
            let oldest = self
                .storage
                .iter()
                .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());

            let Some(key) = oldest else { break };
            if let Some((_, slot)) = self.storage.remove(&key) {
                self.weight.fetch_sub(slot.weight, Ordering::Relaxed);
                debug!("Evicted cache entry (weight {})", slot.weight);
            }
        }
    }
}

impl Default for LruCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Cache for LruCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let slot = self.storage.get(key)?;
        slot.last_used.store(self.tick(), Ordering::Relaxed);
        Some(slot.value.clone())
    }

    fn set(&self, key: &str, value: CacheEntry) {
        let weight = (self.config.weigher)(&value);
        let slot = Slot {
            value,
            weight,
            last_used: AtomicU64::new(self.tick()),
        };

        if let Some(previous) = self.storage.insert(key.to_string(), slot) {
            self.weight.fetch_sub(previous.weight, Ordering::Relaxed);
        }
        self.weight.fetch_add(weight, Ordering::Relaxed);
        self.evict();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_key() {
        let key = cache_key(&["template", "parentTheme/", "foo-bar.html"]);
        assert_eq!(key, "template\u{1f}parentTheme/\u{1f}foo-bar.html");
        assert_ne!(cache_key(&["a", "bc"]), cache_key(&["ab", "c"]));
    }

    #[test]
    fn test_round_trip_and_sentinel() {
        let cache = LruCache::default();
        cache.set(&cache_key(&["a", "b"]), CacheEntry::Path("x.html".into()));
        cache.set(&cache_key(&["a", "c"]), CacheEntry::Missing);

        assert_eq!(
            cache.get(&cache_key(&["a", "b"])),
            Some(CacheEntry::Path("x.html".into()))
        );
        assert_eq!(cache.get(&cache_key(&["a", "c"])), Some(CacheEntry::Missing));
        assert_eq!(cache.get(&cache_key(&["a", "d"])), None);
    }

    #[test]
    fn test_no_cache_stores_nothing() {
        let cache = NoCache;
        cache.set("foo", CacheEntry::Missing);
        assert_eq!(cache.get("foo"), None);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = LruCache::new(CacheConfig::default().with_max_weight(2));
        cache.set("a", CacheEntry::Missing);
        cache.set("b", CacheEntry::Missing);
        // touch "a" so "b" becomes the oldest
        assert!(cache.get("a").is_some());
        cache.set("c", CacheEntry::Missing);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.weight(), 2);
    }

    #[test]
    fn test_file_lists_weigh_their_length() {
        let cache = LruCache::new(CacheConfig::default().with_max_weight(3));
        let files = Arc::new(vec!["a".into(), "b".into(), "c".into()]);
        cache.set("files", CacheEntry::Files(files));
        assert_eq!(cache.weight(), 3);

        cache.set("one", CacheEntry::Missing);
        assert!(cache.get("files").is_none());
        assert_eq!(cache.len(), 1);
    }
}
