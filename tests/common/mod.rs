#![allow(dead_code)]

use stacks_polls::clarity::{decode_hex, encode_bool, encode_uint, to_hex, ClarityValue, Principal};
use stacks_polls::config::Config;
use stacks_polls::events::ContractEvent;
use stacks_polls::hiro::{
    AccountBalance, ApiError, ChainInfo, ContractCall, FunctionArg, NetworkStatus, ReadFunction,
    StacksApi, Transaction, TransactionPage,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const CONTRACT_ADDRESS: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";
pub const CONTRACT_NAME: &str = "voting";

pub fn contract_id() -> String {
    format!("{CONTRACT_ADDRESS}.{CONTRACT_NAME}")
}

/// A valid c32check address derived from `seed`.
pub fn address(seed: u8) -> String {
    Principal::standard(22, [seed; 20]).to_string()
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.contract.address = CONTRACT_ADDRESS.to_string();
    config.contract.name = CONTRACT_NAME.to_string();
    config
}

pub fn poll_value(title: &str) -> ClarityValue {
    poll_value_with_votes(title, 2, 1)
}

pub fn poll_value_with_votes(title: &str, yes: u128, no: u128) -> ClarityValue {
    let mut fields = BTreeMap::new();
    fields.insert(
        "creator".to_string(),
        ClarityValue::Principal(Principal::standard(22, [9; 20])),
    );
    fields.insert("title".to_string(), ClarityValue::StringAscii(title.into()));
    fields.insert(
        "description".to_string(),
        ClarityValue::StringAscii("test poll".into()),
    );
    fields.insert("yes-votes".to_string(), ClarityValue::UInt(yes));
    fields.insert("no-votes".to_string(), ClarityValue::UInt(no));
    fields.insert("end-block".to_string(), ClarityValue::UInt(160_000));
    fields.insert("is-active".to_string(), ClarityValue::Bool(true));
    ClarityValue::OptionalSome(Box::new(ClarityValue::Tuple(fields)))
}

pub fn contract_call_tx(
    tx_id: &str,
    sender: &str,
    contract: &str,
    function: &str,
    args: Vec<String>,
    status: &str,
    time: u64,
) -> Transaction {
    Transaction {
        tx_id: tx_id.to_string(),
        tx_type: "contract_call".to_string(),
        tx_status: status.to_string(),
        sender_address: sender.to_string(),
        burn_block_time: time,
        block_height: Some(150_000),
        contract_call: Some(ContractCall {
            contract_id: contract.to_string(),
            function_name: function.to_string(),
            function_args: args
                .into_iter()
                .map(|hex| FunctionArg {
                    hex,
                    ..Default::default()
                })
                .collect(),
        }),
    }
}

pub fn vote_tx(tx_id: &str, sender: &str, poll_id: u128, yes: bool, time: u64) -> Transaction {
    contract_call_tx(
        tx_id,
        sender,
        &contract_id(),
        "vote",
        vec![to_hex(&encode_uint(poll_id)), to_hex(&encode_bool(yes))],
        "success",
        time,
    )
}

/// A confirmed `vote` notification from `sender` on `poll_id`.
pub fn confirmed_vote(tx_id: &str, sender: &str, poll_id: u128) -> ContractEvent {
    ContractEvent {
        event: "address_tx_update".to_string(),
        tx_id: tx_id.to_string(),
        tx_status: "success".to_string(),
        sender: Some(sender.to_string()),
        function_name: Some("vote".to_string()),
        poll_id: Some(poll_id),
    }
}

pub fn transfer_tx(tx_id: &str, sender: &str, time: u64) -> Transaction {
    Transaction {
        tx_id: tx_id.to_string(),
        tx_type: "token_transfer".to_string(),
        tx_status: "success".to_string(),
        sender_address: sender.to_string(),
        burn_block_time: time,
        ..Default::default()
    }
}

/// In-memory `StacksApi` with call counters.
pub struct FakeApi {
    pub count: Mutex<Result<u128, ApiError>>,
    pub polls: Mutex<HashMap<u128, Result<ClarityValue, ApiError>>>,
    /// Per principal, newest first.
    pub histories: Mutex<HashMap<String, Vec<Transaction>>>,
    pub history_error: Mutex<Option<ApiError>>,
    pub count_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub info_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            count: Mutex::new(Ok(0)),
            polls: Mutex::new(HashMap::new()),
            histories: Mutex::new(HashMap::new()),
            history_error: Mutex::new(None),
            count_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            info_calls: AtomicUsize::new(0),
        }
    }

    /// `count` polls with ids `0..count`.
    pub fn with_polls(count: u128) -> Self {
        let api = Self::new();
        api.set_count(Ok(count));
        for id in 0..count {
            api.set_poll(id, Ok(poll_value(&format!("Poll {id}"))));
        }
        api
    }

    pub fn set_count(&self, count: Result<u128, ApiError>) {
        *self.count.lock().unwrap() = count;
    }

    pub fn set_poll(&self, id: u128, value: Result<ClarityValue, ApiError>) {
        self.polls.lock().unwrap().insert(id, value);
    }

    pub fn set_history(&self, principal: &str, txs: Vec<Transaction>) {
        self.histories
            .lock()
            .unwrap()
            .insert(principal.to_string(), txs);
    }

    /// Prepend `tx` as the newest transaction of `principal`.
    pub fn push_tx(&self, principal: &str, tx: Transaction) {
        self.histories
            .lock()
            .unwrap()
            .entry(principal.to_string())
            .or_default()
            .insert(0, tx);
    }

    pub fn fail_history(&self, error: ApiError) {
        *self.history_error.lock().unwrap() = Some(error);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl StacksApi for FakeApi {
    async fn call_read_only(
        &self,
        function: ReadFunction,
        args: &[String],
        _sender: &str,
    ) -> Result<ClarityValue, ApiError> {
        match function {
            ReadFunction::GetPollCount => {
                self.count_calls.fetch_add(1, Ordering::SeqCst);
                let count = self.count.lock().unwrap().clone()?;
                Ok(ClarityValue::ResponseOk(Box::new(ClarityValue::UInt(count))))
            }
            ReadFunction::GetPoll => {
                self.poll_calls.fetch_add(1, Ordering::SeqCst);
                let id = decode_hex(&args[0])?
                    .as_uint()
                    .ok_or_else(|| ApiError::Validation("poll id".into()))?;
                self.polls
                    .lock()
                    .unwrap()
                    .get(&id)
                    .cloned()
                    .unwrap_or(Ok(ClarityValue::OptionalNone))
            }
        }
    }

    async fn address_transactions(
        &self,
        principal: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TransactionPage, ApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.history_error.lock().unwrap().clone() {
            return Err(e);
        }
        let histories = self.histories.lock().unwrap();
        let all = histories.get(principal).cloned().unwrap_or_default();
        let results: Vec<_> = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(TransactionPage {
            limit,
            offset,
            total: results.len() as u64,
            results,
        })
    }

    async fn chain_info(&self) -> Result<ChainInfo, ApiError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChainInfo {
            stacks_tip_height: 150_123,
            burn_block_height: 870_000,
        })
    }

    async fn account_balance(&self, _principal: &str) -> Result<AccountBalance, ApiError> {
        Ok(AccountBalance::from_micro_stx(1_500_000))
    }

    async fn network_status(&self) -> Result<NetworkStatus, ApiError> {
        Ok(NetworkStatus {
            status: "ready".into(),
            server_version: None,
            chain_tip: None,
        })
    }
}
