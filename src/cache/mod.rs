//! TTL response caches fronting every upstream read.
//!
//! Each cache domain has its own TTL and policy:
//! - `StaleIfError`: on upstream failure, serve the last entry regardless of age
//! - `FreshOnly`: on upstream failure, propagate the error
//!
//! Contract events expire entries rather than removing them, so a
//! `StaleIfError` domain keeps its last good value as a fallback.
//!
//! The clock is injected so expiry can be driven from tests.

use crate::catalog::CatalogWindow;
use crate::config::CacheConfig;
use crate::hiro::{AccountBalance, ChainInfo, NetworkStatus};
use crate::poll::{Poll, PollCatalog, PollVoters};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    StaleIfError,
    FreshOnly,
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: Instant,
    /// Set by `expire`; the entry is never fresh again but still serves
    /// as a stale fallback.
    pub expired: bool,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        !self.expired && now.saturating_duration_since(self.stored_at) < ttl
    }
}

pub struct ResponseCache<K, V> {
    name: &'static str,
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration, policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            ttl,
            policy,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// The entry for `key` if younger than the TTL.
    pub fn get_fresh(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|e| e.is_fresh(now, self.ttl))
            .map(|e| e.data.clone())
    }

    /// The entry for `key` regardless of age.
    pub fn get_any(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|e| e.data.clone())
    }

    /// Fallback after an upstream failure: the last entry if the policy
    /// allows serving stale data.
    pub fn get_stale(&self, key: &K) -> Option<V> {
        match self.policy {
            CachePolicy::StaleIfError => self.get_any(key),
            CachePolicy::FreshOnly => None,
        }
    }

    pub fn insert(&self, key: K, data: V) {
        let stored_at = self.clock.now();
        self.entries.insert(
            key,
            CacheEntry {
                data,
                stored_at,
                expired: false,
            },
        );
    }

    /// Age `key` out of `get_fresh` while keeping it for `get_stale`.
    pub fn expire(&self, key: &K) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expired = true;
        }
    }

    pub fn expire_all(&self) {
        for mut entry in self.entries.iter_mut() {
            entry.expired = true;
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serve a fresh entry, otherwise fetch and store. On fetch failure,
    /// fall back to the last entry when the policy is `StaleIfError`.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        if let Some(hit) = self.get_fresh(&key) {
            debug!(cache = self.name, key = ?key, "cache hit");
            return Ok(hit);
        }

        match fetch().await {
            Ok(data) => {
                self.insert(key, data.clone());
                Ok(data)
            }
            Err(e) => match self.get_stale(&key) {
                Some(stale) => {
                    warn!(cache = self.name, key = ?key, error = %e, "upstream failed, serving stale entry");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }
}

/// One cache per upstream read domain.
pub struct VotingCaches {
    pub poll_count: ResponseCache<(), u128>,
    pub polls: ResponseCache<u128, Poll>,
    pub catalog: ResponseCache<CatalogWindow, PollCatalog>,
    pub user_votes: ResponseCache<String, BTreeSet<u128>>,
    pub voters: ResponseCache<u128, PollVoters>,
    pub chain_info: ResponseCache<(), ChainInfo>,
    pub balances: ResponseCache<String, AccountBalance>,
    pub network_status: ResponseCache<(), NetworkStatus>,
    /// Bumped on every reconciled contract event. A sync that started
    /// under an older epoch read pre-event state and must not be cached.
    epoch: AtomicU64,
}

impl VotingCaches {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let secs = Duration::from_secs;
        Self {
            poll_count: ResponseCache::new(
                "poll_count",
                secs(config.poll_count_ttl_secs),
                CachePolicy::StaleIfError,
                clock.clone(),
            ),
            polls: ResponseCache::new(
                "poll",
                secs(config.poll_ttl_secs),
                CachePolicy::StaleIfError,
                clock.clone(),
            ),
            catalog: ResponseCache::new(
                "catalog",
                secs(config.catalog_ttl_secs),
                CachePolicy::StaleIfError,
                clock.clone(),
            ),
            // A stale "has not voted" answer would re-enable the vote control.
            user_votes: ResponseCache::new(
                "user_votes",
                secs(config.user_votes_ttl_secs),
                CachePolicy::FreshOnly,
                clock.clone(),
            ),
            voters: ResponseCache::new(
                "voters",
                secs(config.voters_ttl_secs),
                CachePolicy::FreshOnly,
                clock.clone(),
            ),
            chain_info: ResponseCache::new(
                "chain_info",
                secs(config.chain_info_ttl_secs),
                CachePolicy::StaleIfError,
                clock.clone(),
            ),
            balances: ResponseCache::new(
                "balance",
                secs(config.balance_ttl_secs),
                CachePolicy::StaleIfError,
                clock.clone(),
            ),
            network_status: ResponseCache::new(
                "network_status",
                secs(config.network_status_ttl_secs),
                CachePolicy::StaleIfError,
                clock,
            ),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn clear(&self) {
        self.poll_count.clear();
        self.polls.clear();
        self.catalog.clear();
        self.user_votes.clear();
        self.voters.clear();
        self.chain_info.clear();
        self.balances.clear();
        self.network_status.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(policy: CachePolicy, clock: Arc<ManualClock>) -> ResponseCache<&'static str, u32> {
        ResponseCache::new("test", Duration::from_secs(10), policy, clock)
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_fetch() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(CachePolicy::StaleIfError, clock.clone());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v: Result<u32, String> = cache
                .get_or_fetch("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(v.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(10));
        let _: Result<u32, String> = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(8)
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get_fresh(&"k"), Some(8));
    }

    #[tokio::test]
    async fn test_stale_if_error() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(CachePolicy::StaleIfError, clock.clone());
        cache.insert("k", 1);
        clock.advance(Duration::from_secs(60));

        let v = cache
            .get_or_fetch("k", || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert_eq!(v, Ok(1));

        let missing = cache
            .get_or_fetch("other", || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert_eq!(missing, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_fresh_only_propagates() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(CachePolicy::FreshOnly, clock.clone());
        cache.insert("k", 1);
        clock.advance(Duration::from_secs(11));

        let v = cache
            .get_or_fetch("k", || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert_eq!(v, Err("boom".to_string()));
    }

    #[test]
    fn test_entry_freshness_boundary() {
        let now = Instant::now();
        let mut entry = CacheEntry {
            data: (),
            stored_at: now,
            expired: false,
        };
        let ttl = Duration::from_secs(5);
        assert!(entry.is_fresh(now + Duration::from_secs(4), ttl));
        assert!(!entry.is_fresh(now + ttl, ttl));

        entry.expired = true;
        assert!(!entry.is_fresh(now, ttl));
    }

    #[tokio::test]
    async fn test_expired_entry_still_serves_stale() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(CachePolicy::StaleIfError, clock.clone());
        cache.insert("a", 1);
        cache.insert("b", 2);

        cache.expire(&"a");
        assert_eq!(cache.get_fresh(&"a"), None);
        assert_eq!(cache.get_fresh(&"b"), Some(2));
        assert_eq!(cache.get_stale(&"a"), Some(1));

        let v = cache
            .get_or_fetch("a", || async { Err::<u32, _>("429".to_string()) })
            .await;
        assert_eq!(v, Ok(1));

        cache.expire_all();
        assert_eq!(cache.get_fresh(&"b"), None);
        assert_eq!(cache.len(), 2);

        cache.insert("b", 3);
        assert_eq!(cache.get_fresh(&"b"), Some(3));
    }

    #[test]
    fn test_epoch_bumps() {
        let caches = VotingCaches::new(&CacheConfig::default(), Arc::new(SystemClock));
        let start = caches.epoch();
        assert_eq!(caches.bump_epoch(), start + 1);
        assert_eq!(caches.epoch(), start + 1);
    }

    #[test]
    fn test_clear_wipes_every_domain() {
        let caches = VotingCaches::new(&CacheConfig::default(), Arc::new(SystemClock));
        caches.poll_count.insert((), 3);
        caches.user_votes.insert("SP1".into(), BTreeSet::from([1u128]));
        caches.clear();
        assert!(caches.poll_count.is_empty());
        assert!(caches.user_votes.is_empty());
    }
}
