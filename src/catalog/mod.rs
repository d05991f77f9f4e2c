//! Poll catalog synchronization.
//!
//! Enumerates the contract's poll records by id: one `get-poll-count` read,
//! then `get-poll` reads in fixed-size concurrent batches separated by a
//! fixed delay. A failed record becomes an in-band `PollFetchFailure`; it
//! never aborts the sync.

use crate::cache::VotingCaches;
use crate::clarity::{encode_uint, to_hex, DecodeError};
use crate::config::CatalogConfig;
use crate::hiro::{ApiError, ReadFunction, StacksApi};
use crate::poll::{Poll, PollCatalog, PollFetchFailure};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Which slice of the id range a sync covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogWindow {
    /// `[0, count)`
    Full,
    /// The most recent `recent_window` ids.
    Recent,
}

impl CatalogWindow {
    pub fn from_windowed(windowed: bool) -> Self {
        if windowed {
            CatalogWindow::Recent
        } else {
            CatalogWindow::Full
        }
    }

    /// First id covered for a collection of `count` records.
    pub fn start(self, count: u128, recent: u128) -> u128 {
        match self {
            CatalogWindow::Full => 0,
            CatalogWindow::Recent => count.saturating_sub(recent),
        }
    }
}

pub struct PollCatalogSync<A> {
    api: Arc<A>,
    caches: Arc<VotingCaches>,
    sender: String,
    batch_size: usize,
    batch_delay: Duration,
    recent_window: u128,
    full_lock: Mutex<()>,
    recent_lock: Mutex<()>,
}

impl<A: StacksApi> PollCatalogSync<A> {
    pub fn new(
        api: Arc<A>,
        caches: Arc<VotingCaches>,
        sender: String,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            api,
            caches,
            sender,
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay(),
            recent_window: u128::from(config.recent_window),
            full_lock: Mutex::new(()),
            recent_lock: Mutex::new(()),
        }
    }

    fn lock_for(&self, window: CatalogWindow) -> &Mutex<()> {
        match window {
            CatalogWindow::Full => &self.full_lock,
            CatalogWindow::Recent => &self.recent_lock,
        }
    }

    /// Poll count through the count cache.
    pub async fn poll_count(&self) -> Result<u128, ApiError> {
        self.caches
            .poll_count
            .get_or_fetch((), || self.fetch_poll_count())
            .await
    }

    /// A single poll through the per-poll cache. Not bounded by the cached
    /// count, so a record created after the last count read is still found.
    /// Absent ids are not cached.
    pub async fn get_poll(&self, poll_id: u128) -> Result<Option<Poll>, ApiError> {
        if let Some(poll) = self.caches.polls.get_fresh(&poll_id) {
            return Ok(Some(poll));
        }
        match self.fetch_poll(poll_id).await {
            Ok(Some(poll)) => {
                self.caches.polls.insert(poll_id, poll.clone());
                Ok(Some(poll))
            }
            Ok(None) => Ok(None),
            Err(e) => match self.caches.polls.get_stale(&poll_id) {
                Some(stale) => {
                    warn!(poll_id = %poll_id, error = %e, "get-poll failed, serving stale poll");
                    Ok(Some(stale))
                }
                None => Err(e),
            },
        }
    }

    /// Catalog for `window`, served from cache while fresh.
    ///
    /// Concurrent callers for the same window serialize here; whoever
    /// acquires the lock second finds the first one's result in the cache.
    /// A result built across a contract event is returned but not cached,
    /// so the next caller rebuilds from post-event reads.
    pub async fn sync(&self, window: CatalogWindow) -> Result<PollCatalog, ApiError> {
        if let Some(catalog) = self.caches.catalog.get_fresh(&window) {
            return Ok(catalog);
        }

        let _guard = self.lock_for(window).lock().await;
        if let Some(catalog) = self.caches.catalog.get_fresh(&window) {
            debug!(window = ?window, "catalog sync coalesced");
            return Ok(catalog);
        }

        let epoch = self.caches.epoch();
        let count = match self.caches.poll_count.get_fresh(&()) {
            Some(count) => count,
            None => match self.fetch_poll_count().await {
                Ok(count) => {
                    if self.caches.epoch() == epoch {
                        self.caches.poll_count.insert((), count);
                    }
                    count
                }
                Err(e) => {
                    return match self.caches.catalog.get_stale(&window) {
                        Some(stale) => {
                            warn!(window = ?window, error = %e, "poll count failed, serving stale catalog");
                            Ok(stale)
                        }
                        None => Err(e),
                    };
                }
            },
        };

        let catalog = if count == 0 {
            PollCatalog::default()
        } else {
            self.fetch_range(window.start(count, self.recent_window), count, epoch)
                .await
        };

        if self.caches.epoch() == epoch {
            self.caches.catalog.insert(window, catalog.clone());
        } else {
            info!(window = ?window, "contract event during sync, result not cached");
        }
        Ok(catalog)
    }

    /// Expire the cached catalogs and count, then rebuild the recent window.
    /// The expired entries stay available as stale fallbacks.
    pub async fn refresh(&self) -> Result<PollCatalog, ApiError> {
        self.caches.catalog.expire_all();
        self.caches.poll_count.expire(&());
        self.sync(CatalogWindow::Recent).await
    }

    async fn fetch_poll_count(&self) -> Result<u128, ApiError> {
        let value = self
            .api
            .call_read_only(ReadFunction::GetPollCount, &[], &self.sender)
            .await?
            .unwrap_ok();
        value
            .as_uint()
            .ok_or_else(|| DecodeError::mismatch(0, "uint", &value).into())
    }

    async fn fetch_poll(&self, poll_id: u128) -> Result<Option<Poll>, ApiError> {
        let args = [to_hex(&encode_uint(poll_id))];
        let value = self
            .api
            .call_read_only(ReadFunction::GetPoll, &args, &self.sender)
            .await?;
        Ok(Poll::from_clarity(poll_id, value)?)
    }

    async fn fetch_indexed(&self, poll_id: u128) -> (u128, Result<Option<Poll>, ApiError>) {
        (poll_id, self.fetch_poll(poll_id).await)
    }

    async fn fetch_range(&self, start: u128, count: u128, epoch: u64) -> PollCatalog {
        let batch = self.batch_size as u128;
        let mut polls = Vec::new();
        let mut failures = Vec::new();
        let mut rate_limited = 0usize;

        let mut next = start;
        while next < count {
            if next > start {
                tokio::time::sleep(self.batch_delay).await;
            }
            let end = count.min(next.saturating_add(batch));

            let reads: Vec<_> = (next..end).map(|id| self.fetch_indexed(id)).collect();
            for (poll_id, result) in join_all(reads).await {
                match result {
                    Ok(Some(poll)) => {
                        if self.caches.epoch() == epoch {
                            self.caches.polls.insert(poll_id, poll.clone());
                        }
                        polls.push(poll);
                    }
                    Ok(None) => debug!(poll_id = %poll_id, "poll id has no record"),
                    Err(e) => {
                        if e.is_rate_limited() {
                            rate_limited += 1;
                        }
                        warn!(poll_id = %poll_id, error = %e, "poll read failed");
                        failures.push(PollFetchFailure {
                            poll_id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            next = end;
        }

        if rate_limited > 0 {
            warn!(rate_limited, "catalog sync was rate limited");
        }
        info!(
            count = %count,
            fetched = polls.len(),
            failed = failures.len(),
            "catalog synced"
        );

        polls.sort_by(|a, b| b.poll_id.cmp(&a.poll_id));
        PollCatalog {
            count,
            polls,
            failures,
        }
    }
}
