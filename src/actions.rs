//! Write side: `create-poll`, `vote` and `end-poll` contract calls.
//!
//! Arguments are validated and Clarity-encoded here, then handed to a
//! `TransactionSubmitter` (the wallet's signing flow). Nothing is broadcast
//! without a connected `WalletIdentity`.

use crate::clarity::ClarityValue;
use crate::hiro::ContractId;
use crate::poll::{VoteChoice, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

pub const BLOCKS_PER_DAY: u128 = 144;

pub const CREATE_POLL: &str = "create-poll";
pub const VOTE: &str = "vote";
pub const END_POLL: &str = "end-poll";

/// Approximate block count for a duration in days (~10 minute blocks).
pub fn days_to_blocks(days: u32) -> u128 {
    u128::from(days) * BLOCKS_PER_DAY
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("wallet not connected")]
    WalletNotConnected,
    #[error("transaction cancelled by user")]
    Cancelled,
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("submit failed: {0}")]
    Submit(String),
}

pub trait WalletIdentity: Send + Sync {
    /// Address of the connected wallet, if any.
    fn current_address(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostConditionMode {
    Allow,
    Deny,
}

/// A contract call ready for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCallRequest {
    pub contract: ContractId,
    pub function_name: &'static str,
    pub args: Vec<ClarityValue>,
    pub post_condition_mode: PostConditionMode,
    pub sender: String,
}

impl ContractCallRequest {
    pub fn args_hex(&self) -> Vec<String> {
        self.args.iter().map(ClarityValue::to_hex).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { tx_id: String },
    Cancelled,
}

pub trait TransactionSubmitter: Send + Sync {
    fn submit(
        &self,
        request: ContractCallRequest,
    ) -> impl Future<Output = Result<SubmitOutcome, String>> + Send;
}

fn ascii_field(field: &'static str, value: &str, max: usize) -> Result<ClarityValue, ActionError> {
    let invalid = |reason: String| ActionError::Validation { field, reason };
    if !value.is_ascii() {
        return Err(invalid("must be ASCII".into()));
    }
    if value.len() > max {
        return Err(invalid(format!("{} bytes exceeds {max}", value.len())));
    }
    Ok(ClarityValue::StringAscii(value.to_string()))
}

pub struct VotingActions<W, S> {
    wallet: W,
    submitter: S,
    contract: ContractId,
}

impl<W: WalletIdentity, S: TransactionSubmitter> VotingActions<W, S> {
    pub fn new(wallet: W, submitter: S, contract: ContractId) -> Self {
        Self {
            wallet,
            submitter,
            contract,
        }
    }

    /// `(create-poll (string-ascii 256) (string-ascii 1024) uint)`
    pub async fn create_poll(
        &self,
        title: &str,
        description: &str,
        duration_blocks: u128,
    ) -> Result<String, ActionError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ActionError::Validation {
                field: "title",
                reason: "must not be empty".into(),
            });
        }
        if duration_blocks == 0 {
            return Err(ActionError::Validation {
                field: "duration",
                reason: "must be at least one block".into(),
            });
        }
        let args = vec![
            ascii_field("title", title, MAX_TITLE_LEN)?,
            ascii_field("description", description, MAX_DESCRIPTION_LEN)?,
            ClarityValue::UInt(duration_blocks),
        ];
        info!(
            title,
            duration_blocks = %duration_blocks,
            days = duration_blocks as f64 / BLOCKS_PER_DAY as f64,
            "create-poll"
        );
        self.submit(CREATE_POLL, args).await
    }

    /// `(vote uint bool)`
    pub async fn vote(&self, poll_id: u128, choice: VoteChoice) -> Result<String, ActionError> {
        let args = vec![ClarityValue::UInt(poll_id), ClarityValue::Bool(choice.as_bool())];
        self.submit(VOTE, args).await
    }

    /// `(end-poll uint)`
    pub async fn end_poll(&self, poll_id: u128) -> Result<String, ActionError> {
        self.submit(END_POLL, vec![ClarityValue::UInt(poll_id)]).await
    }

    async fn submit(
        &self,
        function_name: &'static str,
        args: Vec<ClarityValue>,
    ) -> Result<String, ActionError> {
        let sender = self
            .wallet
            .current_address()
            .ok_or(ActionError::WalletNotConnected)?;

        let request = ContractCallRequest {
            contract: self.contract.clone(),
            function_name,
            args,
            post_condition_mode: PostConditionMode::Allow,
            sender,
        };

        match self.submitter.submit(request).await {
            Ok(SubmitOutcome::Submitted { tx_id }) => {
                info!(function = function_name, tx_id = %tx_id, "transaction submitted");
                Ok(tx_id)
            }
            Ok(SubmitOutcome::Cancelled) => Err(ActionError::Cancelled),
            Err(e) => {
                warn!(function = function_name, error = %e, "transaction submit failed");
                Err(ActionError::Submit(e))
            }
        }
    }
}
