//! Response cache keyed by normalized text.
//!
//! Strict LRU with a TTL: capacity and age are independent eviction
//! triggers. Expired entries are dropped lazily when read.

use crate::config::CacheSettings;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
}

/// LRU-based response cache with TTL
pub struct ResponseCache {
    /// `None` when disabled or sized to zero
    entries: Option<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            ttl,
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        if !settings.enabled {
            return Self::disabled();
        }
        Self::new(settings.max_size, Duration::from_secs(settings.ttl_secs))
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            entries: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Look up a value, promoting it to most-recently-used.
    ///
    /// An entry older than the TTL is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let ttl = self.ttl;
        let entries = self.entries.as_mut()?;

        let expired = entries.peek(key)?.inserted_at.elapsed() > ttl;
        if expired {
            entries.pop(key);
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value; the least-recently-used entry is evicted first when full.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(
                key.to_string(),
                CacheEntry {
                    value: value.to_string(),
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}
