//! # TTL Cache
//! Generic key → value store with a per-category time-to-live.
//!
//! - Expired entries are treated as a MISS and removed lazily on `get`.
//! - When the map grows past `max_entries`, `put` compacts it: expired entries
//!   go first, then the oldest-created ones until the map is back down to 90%
//!   of the bound. Creation order lives in a queue, so compaction never sorts
//!   and runs once per batch of inserts rather than on every one.
//! - Every read and write goes through one `Mutex`, so concurrent handlers
//!   never observe a half-written entry.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Data kinds with distinct freshness requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// Channel search results (short-lived).
    Search,
    /// Channel profile + recent videos.
    Channel,
    /// Trend interest scores.
    Trend,
}

impl CacheCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Channel => "channel",
            Self::Trend => "trend",
        }
    }
}

/// TTL per category.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub search: Duration,
    pub channel: Duration,
    pub trend: Duration,
}

impl CacheTtls {
    pub fn for_category(&self, category: CacheCategory) -> Duration {
        match category {
            CacheCategory::Search => self.search,
            CacheCategory::Channel => self.channel,
            CacheCategory::Trend => self.trend,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            search: Duration::from_secs(15 * 60),
            channel: Duration::from_secs(6 * 3600),
            trend: Duration::from_secs(3600),
        }
    }
}

/// Cache key: provider + operation + parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: String,
    pub operation: String,
    pub params: String,
}

impl CacheKey {
    /// Parameters are lower-cased and whitespace-collapsed so equivalent
    /// queries share an entry.
    pub fn new(provider: &str, operation: &str, params: &str) -> Self {
        Self {
            provider: provider.to_string(),
            operation: operation.to_string(),
            params: params
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.operation, self.params)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

#[derive(Debug)]
struct State<V> {
    map: HashMap<CacheKey, CacheEntry<V>>,
    /// Insertion order. May hold stale stamps for overwritten or removed keys.
    order: VecDeque<(CacheKey, Instant)>,
    hits: u64,
    misses: u64,
}

/// Point-in-time counters for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe TTL cache shared by all request handlers.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Mutex<State<V>>,
    ttls: CacheTtls,
    max_entries: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttls: CacheTtls, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(State {
                map: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
            ttls,
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<V>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Return a clone of the live payload, or `None` on MISS.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let expired = match state.map.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let payload = entry.payload.clone();
                state.hits += 1;
                counter!("cache_hits_total").increment(1);
                debug!(target: "cache", %key, "cache hit");
                return Some(payload);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.map.remove(key);
            debug!(target: "cache", %key, "cache miss (expired)");
        }
        state.misses += 1;
        counter!("cache_misses_total").increment(1);
        None
    }

    /// Store `payload` with the TTL configured for `category`.
    pub fn put(&self, key: CacheKey, payload: V, category: CacheCategory) {
        let entry = CacheEntry {
            payload,
            created_at: Instant::now(),
            ttl: self.ttls.for_category(category),
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        state.order.push_back((key.clone(), entry.created_at));
        state.map.insert(key, entry);
        if state.map.len() > self.max_entries {
            Self::compact(state, self.max_entries);
        } else if state.order.len() > self.max_entries * 2 {
            Self::drop_stale_order(state);
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        let before = state.map.len();
        state.map.retain(|_, e| !e.is_expired(now));
        Self::drop_stale_order(state);
        before - state.map.len()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.map.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }

    fn compact(state: &mut State<V>, max_entries: usize) {
        let now = Instant::now();
        let before = state.map.len();
        state.map.retain(|_, e| !e.is_expired(now));
        let expired = before - state.map.len();

        let low_water = max_entries - max_entries / 10;
        let mut evicted = 0;
        while state.map.len() > low_water {
            let Some((key, stamp)) = state.order.pop_front() else {
                break;
            };
            if state.map.get(&key).is_some_and(|e| e.created_at == stamp) {
                state.map.remove(&key);
                evicted += 1;
            }
        }
        Self::drop_stale_order(state);
        debug!(target: "cache", expired, evicted, "cache compacted");
    }

    fn drop_stale_order(state: &mut State<V>) {
        let map = &state.map;
        state
            .order
            .retain(|(key, stamp)| map.get(key).is_some_and(|e| e.created_at == *stamp));
    }
}
