//! Read-side facade over the catalog, history scanner and caches.
//!
//! One instance is shared by every request handler and by the event
//! callback; the caches inside it are the only shared state.

use crate::cache::{Clock, VotingCaches};
use crate::catalog::{CatalogWindow, PollCatalogSync};
use crate::clarity::principal::{self, Principal};
use crate::config::Config;
use crate::events::ContractEvent;
use crate::hiro::{AccountBalance, ApiError, ChainInfo, ContractId, NetworkStatus, StacksApi};
use crate::history::TransactionHistoryScanner;
use crate::poll::{Poll, PollCatalog, PollVoters};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct VotingService<A> {
    api: Arc<A>,
    caches: Arc<VotingCaches>,
    catalog: PollCatalogSync<A>,
    history: TransactionHistoryScanner<A>,
    contract: ContractId,
}

impl<A: StacksApi> VotingService<A> {
    pub fn new(api: Arc<A>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let caches = Arc::new(VotingCaches::new(&config.cache, clock));
        let contract = config.contract_id();
        let catalog = PollCatalogSync::new(
            api.clone(),
            caches.clone(),
            config.read_sender(),
            &config.catalog,
        );
        let history = TransactionHistoryScanner::new(
            api.clone(),
            &contract,
            config.contract.vote_function.clone(),
            &config.history,
        );
        Self {
            api,
            caches,
            catalog,
            history,
            contract,
        }
    }

    pub fn caches(&self) -> &VotingCaches {
        &self.caches
    }

    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    pub async fn get_poll_count(&self) -> Result<u128, ApiError> {
        self.catalog.poll_count().await
    }

    pub async fn get_poll(&self, poll_id: u128) -> Result<Option<Poll>, ApiError> {
        self.catalog.get_poll(poll_id).await
    }

    /// `windowed = false` scans every id; `true` only the most recent window.
    pub async fn get_all_polls(&self, windowed: bool) -> Result<PollCatalog, ApiError> {
        self.catalog
            .sync(CatalogWindow::from_windowed(windowed))
            .await
    }

    /// Votes cast by `address`. The address is normalised to its canonical
    /// c32check form, which is what contract events carry as the sender.
    pub async fn get_user_votes(&self, address: &str) -> Result<BTreeSet<u128>, ApiError> {
        let address = validate_principal(address)?.to_string();
        self.caches
            .user_votes
            .get_or_fetch(address.clone(), || self.history.user_votes(&address))
            .await
    }

    pub async fn get_poll_voters(&self, poll_id: u128) -> Result<PollVoters, ApiError> {
        self.caches
            .voters
            .get_or_fetch(poll_id, || self.history.poll_voters(poll_id))
            .await
    }

    pub fn clear_cache(&self) {
        self.caches.clear();
        info!("all caches cleared");
    }

    pub async fn get_chain_info(&self) -> Result<ChainInfo, ApiError> {
        self.caches
            .chain_info
            .get_or_fetch((), || self.api.chain_info())
            .await
    }

    pub async fn get_balance(&self, address: &str) -> Result<AccountBalance, ApiError> {
        let address = validate_principal(address)?.to_string();
        self.caches
            .balances
            .get_or_fetch(address.clone(), || self.api.account_balance(&address))
            .await
    }

    pub async fn get_network_status(&self) -> Result<NetworkStatus, ApiError> {
        self.caches
            .network_status
            .get_or_fetch((), || self.api.network_status())
            .await
    }

    /// Expire whatever a confirmed contract event may have changed, keeping
    /// the last values as stale fallbacks. Returns whether anything was
    /// expired.
    pub fn reconcile(&self, event: &ContractEvent) -> bool {
        if !event.is_success() {
            debug!(tx_id = %event.tx_id, status = %event.tx_status, "ignoring unconfirmed event");
            return false;
        }

        let epoch = self.caches.bump_epoch();
        self.caches.poll_count.expire(&());
        self.caches.catalog.expire_all();
        if let Some(poll_id) = event.poll_id {
            self.caches.polls.expire(&poll_id);
            self.caches.voters.expire(&poll_id);
        }
        if let Some(sender) = &event.sender {
            self.caches.user_votes.expire(sender);
        }

        info!(
            tx_id = %event.tx_id,
            epoch,
            function = event.function_name.as_deref().unwrap_or("-"),
            poll_id = ?event.poll_id,
            "caches reconciled"
        );
        true
    }

    /// Rebuild the recent catalog after a reconcile.
    pub async fn refresh_catalog(&self) -> Result<PollCatalog, ApiError> {
        self.catalog.refresh().await
    }
}

fn validate_principal(address: &str) -> Result<Principal, ApiError> {
    principal::validate(address)
        .map_err(|e| ApiError::Validation(format!("invalid principal `{address}`: {e}")))
}
