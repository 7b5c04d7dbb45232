//! Snapshot store.
//!
//! Holds the published [`Snapshot`] and the market-data [`CacheEntry`] behind
//! a single mutex. Every read and write is one short critical section (a
//! clone or a field replacement); the lock is never held across an `.await`
//! or an external call.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use log::warn;
use serde_json::Value;
use tokio::time::Instant;

use crate::cache::CacheEntry;
use crate::models::{Fragment, Snapshot};

/// Provider name under which the market-data payload is cached.
pub const MARKET_CACHE_KEY: &str = "MARKET_DATA";

struct StoreState {
    snapshot: Snapshot,
    market_cache: CacheEntry<BTreeMap<String, Value>>,
}

/// Mutually-exclusive holder of the current snapshot.
pub struct SnapshotStore {
    state: Mutex<StoreState>,
}

impl SnapshotStore {
    pub fn new(market_cache_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(StoreState {
                snapshot: Snapshot::default(),
                market_cache: CacheEntry::new(MARKET_CACHE_KEY, market_cache_ttl),
            }),
        }
    }

    /// Lock the state, recovering from poison if necessary.
    ///
    /// Writers replace whole fields, so a panic inside a critical section
    /// cannot leave a field half-written.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Snapshot store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    /// Replace the fields owned by the fragment's fetcher.
    pub fn commit(&self, fragment: Fragment) {
        self.lock().snapshot.apply(fragment);
    }

    /// Republish the cached market data if the cache is fresh.
    ///
    /// Returns `false` on a miss. The field timestamp keeps the time of the
    /// fetch that filled the cache.
    pub fn publish_cached_market_data(&self, now: Instant) -> bool {
        let mut state = self.lock();
        match state.market_cache.get(now) {
            Some(data) => {
                state.snapshot.market_data = data;
                true
            }
            None => false,
        }
    }

    /// Store freshly fetched market data in the cache and publish it.
    pub fn commit_market_data(&self, data: BTreeMap<String, Value>, now: Instant) {
        let mut state = self.lock();
        state.market_cache.put(data.clone(), now);
        state.snapshot.apply(Fragment::Market {
            data,
            fetched_at: Utc::now(),
        });
    }

    pub fn invalidate_market_cache(&self) {
        self.lock().market_cache.invalidate();
    }
}
