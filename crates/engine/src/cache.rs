//! Single-slot TTL cache.
//!
//! Holds the last successful payload of one expensive provider so that an
//! extra refresh inside the TTL window does not re-run the provider. The
//! entry lives inside the snapshot store's lock; it has no synchronization of
//! its own.

use std::time::Duration;

use tokio::time::Instant;

/// Values that can be "empty" and must then never be served from cache.
pub trait Cacheable: Clone {
    fn is_empty_value(&self) -> bool;
}

impl<K: Clone, V: Clone> Cacheable for std::collections::BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

/// Cache slot for one provider.
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    provider: String,
    value: Option<T>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

impl<T: Cacheable> CacheEntry<T> {
    pub fn new(provider: impl Into<String>, ttl: Duration) -> Self {
        Self {
            provider: provider.into(),
            value: None,
            fetched_at: None,
            ttl,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value iff it is non-empty and `now - fetched_at < ttl`.
    pub fn get(&self, now: Instant) -> Option<T> {
        let fetched_at = self.fetched_at?;
        let value = self.value.as_ref()?;
        if value.is_empty_value() || now.saturating_duration_since(fetched_at) >= self.ttl {
            return None;
        }
        Some(value.clone())
    }

    /// Overwrite the value and reset the fetch timestamp.
    pub fn put(&mut self, value: T, now: Instant) {
        self.value = Some(value);
        self.fetched_at = Some(now);
    }

    pub fn invalidate(&mut self) {
        self.value = None;
        self.fetched_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    type Map = BTreeMap<String, u32>;

    fn one() -> Map {
        BTreeMap::from([("price".to_string(), 1)])
    }

    #[test]
    fn test_empty_slot_misses() {
        let entry: CacheEntry<Map> = CacheEntry::new("MARKET", Duration::from_secs(60));
        assert!(entry.get(Instant::now()).is_none());
    }

    #[test]
    fn test_hit_within_ttl_and_miss_after() {
        let start = Instant::now();
        let mut entry = CacheEntry::new("MARKET", Duration::from_secs(60));
        entry.put(one(), start);

        assert_eq!(entry.get(start + Duration::from_secs(59)), Some(one()));
        assert!(entry.get(start + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_put_resets_timestamp() {
        let start = Instant::now();
        let mut entry = CacheEntry::new("MARKET", Duration::from_secs(10));
        entry.put(one(), start);
        entry.put(one(), start + Duration::from_secs(8));

        assert!(entry.get(start + Duration::from_secs(15)).is_some());
    }

    #[test]
    fn test_empty_value_is_never_served() {
        let start = Instant::now();
        let mut entry = CacheEntry::new("MARKET", Duration::from_secs(60));
        entry.put(Map::new(), start);
        assert!(entry.get(start).is_none());
    }

    #[test]
    fn test_invalidate() {
        let start = Instant::now();
        let mut entry = CacheEntry::new("MARKET", Duration::from_secs(60));
        entry.put(one(), start);
        entry.invalidate();
        assert!(entry.get(start).is_none());
    }
}
