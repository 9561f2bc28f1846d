//! Shared enrichment cache: LRU-capped, TTL-evicted, reader/writer
//! guarded.

use crate::provider::ProviderValue;
use leadflow_types::CacheConfig;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(provider: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheSlot {
    /// `None` is a cached negative lookup
    value: Option<ProviderValue>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheSlot {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// A cache hit: either a value or a remembered miss.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheHit {
    Value(ProviderValue),
    Negative,
}

pub struct EnrichmentCache {
    slots: RwLock<LruCache<CacheKey, CacheSlot>>,
    ttl: Duration,
    negative_ttl: Duration,
}

impl EnrichmentCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).expect("capacity is at least 1");
        Self {
            slots: RwLock::new(LruCache::new(capacity)),
            ttl: config.ttl(),
            negative_ttl: config.negative_ttl(),
        }
    }

    /// Fresh value for the exact key, bumping recency. Expired slots are
    /// dropped on access; full eviction also happens on insert via LRU.
    pub fn get(&self, key: &CacheKey) -> Option<CacheHit> {
        let mut slots = self.slots.write().expect("cache lock poisoned");
        match slots.get(key) {
            Some(slot) if slot.is_fresh() => Some(match &slot.value {
                Some(value) => CacheHit::Value(value.clone()),
                None => CacheHit::Negative,
            }),
            Some(_) => {
                slots.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: CacheKey, value: ProviderValue) {
        let mut slots = self.slots.write().expect("cache lock poisoned");
        slots.put(
            key,
            CacheSlot {
                value: Some(value),
                stored_at: Instant::now(),
                ttl: self.ttl,
            },
        );
    }

    /// Remember a definitive miss for a short window so repeated leads do
    /// not hammer the provider.
    pub fn put_negative(&self, key: CacheKey) {
        let mut slots = self.slots.write().expect("cache lock poisoned");
        slots.put(
            key,
            CacheSlot {
                value: None,
                stored_at: Instant::now(),
                ttl: self.negative_ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.slots.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh entries with their remaining TTL, oldest-recency first. Used
    /// by the store to persist the cache across restarts.
    pub fn snapshot(&self) -> Vec<(CacheKey, Option<ProviderValue>, Duration)> {
        let slots = self.slots.read().expect("cache lock poisoned");
        slots
            .iter()
            .rev()
            .filter(|(_, slot)| slot.is_fresh())
            .map(|(key, slot)| {
                let remaining = slot.ttl.saturating_sub(slot.stored_at.elapsed());
                (key.clone(), slot.value.clone(), remaining)
            })
            .collect()
    }

    /// Replay persisted entries (with their remaining TTL) at startup.
    pub fn restore(&self, entries: Vec<(CacheKey, Option<ProviderValue>, Duration)>) {
        let mut slots = self.slots.write().expect("cache lock poisoned");
        for (key, value, remaining) in entries {
            if remaining.is_zero() {
                continue;
            }
            slots.put(
                key,
                CacheSlot {
                    value,
                    stored_at: Instant::now(),
                    ttl: remaining,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize) -> CacheConfig {
        CacheConfig {
            capacity,
            ttl_secs: 3600,
            negative_ttl_secs: 60,
        }
    }

    #[test]
    fn test_hit_returns_stored_value() {
        let cache = EnrichmentCache::new(&config(10));
        let key = CacheKey::new("domains", "sound builders");
        cache.put(key.clone(), ProviderValue::Domain("soundbuilders.com".into()));
        assert_eq!(
            cache.get(&key),
            Some(CacheHit::Value(ProviderValue::Domain(
                "soundbuilders.com".into()
            )))
        );
    }

    #[test]
    fn test_negative_hit() {
        let cache = EnrichmentCache::new(&config(10));
        let key = CacheKey::new("domains", "unknown co");
        cache.put_negative(key.clone());
        assert_eq!(cache.get(&key), Some(CacheHit::Negative));
    }

    #[test]
    fn test_lru_cap_evicts_oldest() {
        let cache = EnrichmentCache::new(&config(2));
        let first = CacheKey::new("p", "a");
        cache.put(first.clone(), ProviderValue::Domain("a.com".into()));
        cache.put(CacheKey::new("p", "b"), ProviderValue::Domain("b.com".into()));
        cache.put(CacheKey::new("p", "c"), ProviderValue::Domain("c.com".into()));
        assert!(cache.get(&first).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_expired_slot_is_dropped() {
        let mut cfg = config(10);
        cfg.ttl_secs = 0;
        let cache = EnrichmentCache::new(&cfg);
        let key = CacheKey::new("p", "x");
        cache.put(key.clone(), ProviderValue::Domain("x.com".into()));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }
}
