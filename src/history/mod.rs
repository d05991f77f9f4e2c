//! Participation state derived from transaction history.
//!
//! Pages an address's transactions newest first and keeps successful calls
//! to the contract's vote function. Arguments are decoded from their binary
//! hex form: `(vote (poll-id uint) (vote-yes bool))`.

use crate::clarity::decode_hex;
use crate::config::HistoryConfig;
use crate::hiro::{ApiError, ContractCall, ContractId, StacksApi, Transaction, MAX_PAGE_SIZE};
use crate::poll::{PollVoters, VoteChoice, VoterRecord};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A decoded vote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteCall {
    pub poll_id: u128,
    pub choice: VoteChoice,
}

impl VoteCall {
    /// Decode `(poll-id uint, vote-yes bool)` from a call's arguments.
    pub fn from_call(call: &ContractCall) -> Result<Self, String> {
        let [poll_arg, choice_arg, ..] = call.function_args.as_slice() else {
            return Err(format!(
                "expected 2 arguments, got {}",
                call.function_args.len()
            ));
        };
        let poll_id = decode_hex(&poll_arg.hex)
            .map_err(|e| format!("poll-id: {e}"))?
            .as_uint()
            .ok_or_else(|| "poll-id is not a uint".to_string())?;
        let yes = decode_hex(&choice_arg.hex)
            .map_err(|e| format!("vote-yes: {e}"))?
            .as_bool()
            .ok_or_else(|| "vote-yes is not a bool".to_string())?;
        Ok(Self {
            poll_id,
            choice: VoteChoice::from(yes),
        })
    }
}

pub struct TransactionHistoryScanner<A> {
    api: Arc<A>,
    contract_id: String,
    vote_function: String,
    page_size: u32,
    max_pages: u32,
}

impl<A: StacksApi> TransactionHistoryScanner<A> {
    pub fn new(
        api: Arc<A>,
        contract: &ContractId,
        vote_function: impl Into<String>,
        config: &HistoryConfig,
    ) -> Self {
        Self {
            api,
            contract_id: contract.to_string(),
            vote_function: vote_function.into(),
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            max_pages: config.max_pages.max(1),
        }
    }

    /// Ids of every poll `address` has a successful vote on, within the scan
    /// horizon.
    pub async fn user_votes(&self, address: &str) -> Result<BTreeSet<u128>, ApiError> {
        let votes = self.scan(address).await?;
        Ok(votes.into_iter().map(|(call, _)| call.poll_id).collect())
    }

    /// Every successful vote on `poll_id`, found by scanning the contract's
    /// own principal. Duplicates are kept; the contract enforces uniqueness.
    pub async fn poll_voters(&self, poll_id: u128) -> Result<PollVoters, ApiError> {
        let records = self
            .scan(&self.contract_id)
            .await?
            .into_iter()
            .filter(|(call, _)| call.poll_id == poll_id)
            .map(|(call, tx)| VoterRecord {
                address: tx.sender_address,
                vote: call.choice,
                timestamp: tx.burn_block_time,
                tx_id: tx.tx_id,
            })
            .collect();
        Ok(PollVoters::from_records(poll_id, records))
    }

    /// Page through `principal`'s history until a short page or the page cap.
    /// Any page failure fails the scan.
    async fn scan(&self, principal: &str) -> Result<Vec<(VoteCall, Transaction)>, ApiError> {
        let mut votes = Vec::new();

        for page_no in 0..self.max_pages {
            let offset = page_no * self.page_size;
            let page = self
                .api
                .address_transactions(principal, self.page_size, offset)
                .await?;
            let fetched = page.results.len();

            for tx in page.results {
                let Some(call) = tx.successful_call_to(&self.contract_id, &self.vote_function)
                else {
                    continue;
                };
                match VoteCall::from_call(call) {
                    Ok(vote) => votes.push((vote, tx)),
                    Err(reason) => {
                        warn!(tx_id = %tx.tx_id, reason = %reason, "skipping malformed vote call")
                    }
                }
            }

            if fetched < self.page_size as usize {
                break;
            }
        }

        debug!(principal, votes = votes.len(), "history scanned");
        Ok(votes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hiro::FunctionArg;

    fn arg(hex: &str) -> FunctionArg {
        FunctionArg {
            hex: hex.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_vote_call_decodes_binary_args() {
        let call = ContractCall {
            contract_id: "SP000000000000000000002Q6VF78.voting".into(),
            function_name: "vote".into(),
            function_args: vec![arg("0x0100000000000000000000000000000005"), arg("0x04")],
        };
        let vote = VoteCall::from_call(&call).unwrap();
        assert_eq!(vote.poll_id, 5);
        assert_eq!(vote.choice, VoteChoice::No);
    }

    #[test]
    fn test_vote_call_rejects_bad_args() {
        let mut call = ContractCall {
            function_args: vec![arg("0x03")],
            ..Default::default()
        };
        assert!(VoteCall::from_call(&call).is_err());

        call.function_args = vec![arg("0x03"), arg("0x03")];
        assert!(VoteCall::from_call(&call)
            .unwrap_err()
            .contains("not a uint"));

        call.function_args = vec![arg("0x01ff"), arg("0x03")];
        assert!(VoteCall::from_call(&call).unwrap_err().starts_with("poll-id"));
    }
}
