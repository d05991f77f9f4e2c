//! Polling fallback for the event feed.
//!
//! Fetches the newest page of the watched address's transactions on a fixed
//! interval and emits the ones newer than the last seen tx id. The first
//! successful fetch only records the baseline, which may be empty.

use super::{ContractEvent, EventError, EventTransport, Subscription, ADDRESS_TX_UPDATE};
use crate::hiro::{StacksApi, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct PollingTransport<A> {
    api: Arc<A>,
    poll_every: Duration,
    limit: u32,
}

impl<A: StacksApi> PollingTransport<A> {
    pub fn new(api: Arc<A>, poll_every: Duration, limit: u32) -> Self {
        Self {
            api,
            poll_every,
            limit,
        }
    }
}

/// Transactions in `page` (newest first) that precede `last_seen`, returned
/// oldest first. All of them when `last_seen` is not on the page.
pub fn newer_than<'a>(page: &'a [Transaction], last_seen: &str) -> Vec<&'a Transaction> {
    page.iter()
        .take_while(|tx| tx.tx_id != last_seen)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

impl<A: StacksApi> EventTransport for PollingTransport<A> {
    async fn subscribe(&self, address: &str) -> Result<Subscription, EventError> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (release, release_rx) = oneshot::channel();

        tokio::spawn(run_poller(
            self.api.clone(),
            address.to_string(),
            self.poll_every,
            self.limit,
            event_tx,
            release_rx,
        ));
        info!(address, every = ?self.poll_every, "polling for contract events");

        Ok(Subscription { events, release })
    }
}

async fn run_poller<A: StacksApi>(
    api: Arc<A>,
    address: String,
    poll_every: Duration,
    limit: u32,
    event_tx: mpsc::UnboundedSender<ContractEvent>,
    mut release_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval(poll_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut primed = false;
    let mut last_seen: Option<String> = None;

    loop {
        tokio::select! {
            _ = &mut release_rx => {
                debug!(address = %address, "poller released");
                break;
            }
            _ = ticker.tick() => {
                let page = match api.address_transactions(&address, limit, 0).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(error = %e, "event poll failed");
                        continue;
                    }
                };

                if primed {
                    let fresh = match last_seen.as_deref() {
                        Some(seen) => newer_than(&page.results, seen),
                        None => page.results.iter().rev().collect(),
                    };
                    for tx in fresh {
                        if event_tx
                            .send(ContractEvent::from_transaction(ADDRESS_TX_UPDATE, tx))
                            .is_err()
                        {
                            return;
                        }
                    }
                }
                primed = true;
                if let Some(newest) = page.results.first() {
                    last_seen = Some(newest.tx_id.clone());
                }
            }
        }
    }
}
