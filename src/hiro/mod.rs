//! Hiro Stacks API access.
//!
//! - `StacksApi`: the seam the sync, scan and event layers depend on
//! - `HiroClient`: the `reqwest` implementation against api.hiro.so
//! - `types`: wire shapes of the read-only call, history and info endpoints

pub mod client;
pub mod types;

use crate::clarity::{ClarityValue, DecodeError};
use std::fmt;
use std::future::Future;
use thiserror::Error;

pub use client::HiroClient;
pub use types::{
    AccountBalance, ChainInfo, ContractCall, ContractId, FunctionArg, NetworkStatus, Transaction,
    TransactionPage,
};

/// Maximum `limit` the history endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network-level failure (connect, timeout, reset). Retryable.
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-success answer from the API, including `okay: false` read results.
    #[error("upstream error {status}: {body}")]
    Upstream { status: u16, body: String },
    /// Malformed wire value. Not retryable.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    /// Caller supplied an invalid id or address.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Upstream { status, .. } => *status == 429 || *status >= 500,
            ApiError::Decode(_) | ApiError::Validation(_) => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::Upstream { status: 429, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ApiError::Upstream {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None => ApiError::Transport(e.to_string()),
        }
    }
}

/// Read-only functions exposed by the voting contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadFunction {
    GetPollCount,
    GetPoll,
}

impl ReadFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadFunction::GetPollCount => "get-poll-count",
            ReadFunction::GetPoll => "get-poll",
        }
    }
}

impl fmt::Display for ReadFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream operations the core needs. Every call is one outbound request.
pub trait StacksApi: Send + Sync + 'static {
    /// Invoke a read-only contract function. `args` are hex-encoded Clarity
    /// values. Returns the decoded result value.
    fn call_read_only(
        &self,
        function: ReadFunction,
        args: &[String],
        sender: &str,
    ) -> impl Future<Output = Result<ClarityValue, ApiError>> + Send;

    /// One page of an address's transaction history, newest first.
    fn address_transactions(
        &self,
        principal: &str,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<TransactionPage, ApiError>> + Send;

    fn chain_info(&self) -> impl Future<Output = Result<ChainInfo, ApiError>> + Send;

    fn account_balance(
        &self,
        principal: &str,
    ) -> impl Future<Output = Result<AccountBalance, ApiError>> + Send;

    fn network_status(&self) -> impl Future<Output = Result<NetworkStatus, ApiError>> + Send;
}
