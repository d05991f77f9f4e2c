//! Wire types for the Hiro API endpoints we call.
//!
//! Only the fields we read are modelled; everything else is ignored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clarity::principal::{self, PrincipalError};

/// `address.contract-name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractId {
    pub address: String,
    pub name: String,
}

impl ContractId {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.name)
    }
}

impl FromStr for ContractId {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = principal::validate(s)?;
        let address = parsed.address();
        match parsed.contract_name {
            Some(name) => Ok(Self { address, name }),
            None => Err(PrincipalError::BadContractName(String::new())),
        }
    }
}

// ─── Read-only call ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct ReadOnlyRequest<'a> {
    pub sender: &'a str,
    pub arguments: &'a [String],
}

/// `POST /v2/contracts/call-read/...` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadOnlyResponse {
    pub okay: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
}

// ─── Transaction history ─────────────────────────────────────────────────────

/// `GET /extended/v1/address/{principal}/transactions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub results: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transaction {
    pub tx_id: String,
    #[serde(default)]
    pub tx_type: String,
    #[serde(default)]
    pub tx_status: String,
    #[serde(default)]
    pub sender_address: String,
    #[serde(default)]
    pub burn_block_time: u64,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub contract_call: Option<ContractCall>,
}

impl Transaction {
    pub fn is_success(&self) -> bool {
        self.tx_status == "success"
    }

    /// The contract call target if this is a successful call to
    /// `contract_id::function_name`.
    pub fn successful_call_to(&self, contract_id: &str, function_name: &str) -> Option<&ContractCall> {
        if self.tx_type != "contract_call" || !self.is_success() {
            return None;
        }
        self.contract_call
            .as_ref()
            .filter(|c| c.contract_id == contract_id && c.function_name == function_name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractCall {
    pub contract_id: String,
    pub function_name: String,
    #[serde(default)]
    pub function_args: Vec<FunctionArg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionArg {
    /// Hex-encoded Clarity value; the only field we decode.
    pub hex: String,
    #[serde(default)]
    pub repr: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub arg_type: String,
}

// ─── Chain / account info ────────────────────────────────────────────────────

/// Subset of `GET /v2/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ChainInfo {
    pub stacks_tip_height: u64,
    pub burn_block_height: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BalancesResponse {
    pub stx: StxBalance,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StxBalance {
    /// Micro-STX as a decimal string.
    pub balance: String,
}

const MICRO_STX_PER_STX: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub micro_stx: u128,
    /// Display value; lossy above 2^53 micro-STX.
    pub stx_balance: f64,
}

impl AccountBalance {
    pub fn from_micro_stx(micro_stx: u128) -> Self {
        Self {
            micro_stx,
            stx_balance: micro_stx as f64 / MICRO_STX_PER_STX,
        }
    }
}

/// Subset of `GET /extended/v1/status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct NetworkStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub server_version: Option<String>,
    #[serde(default)]
    pub chain_tip: Option<ChainTip>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ChainTip {
    pub block_height: u64,
    #[serde(default)]
    pub block_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "limit": 50, "offset": 0, "total": 2,
        "results": [
            {
                "tx_id": "0xaaa",
                "tx_type": "contract_call",
                "tx_status": "success",
                "sender_address": "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
                "burn_block_time": 1700000000,
                "block_height": 150000,
                "fee_rate": "3000",
                "contract_call": {
                    "contract_id": "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.voting",
                    "function_name": "vote",
                    "function_signature": "(define-public (vote (poll-id uint) (vote-yes bool)))",
                    "function_args": [
                        {"hex": "0x0100000000000000000000000000000002", "repr": "u2", "name": "poll-id", "type": "uint"},
                        {"hex": "0x03", "repr": "true", "name": "vote-yes", "type": "bool"}
                    ]
                }
            },
            {
                "tx_id": "0xbbb",
                "tx_type": "token_transfer",
                "tx_status": "success",
                "sender_address": "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
                "burn_block_time": 1699999000
            }
        ]
    }"#;

    #[test]
    fn test_contract_id_from_str() {
        let id: ContractId = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.voting".parse().unwrap();
        assert_eq!(id.address, "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7");
        assert_eq!(id.name, "voting");

        let lower: ContractId = "Sp2j6zy48gv1ez5v2v5rb9mp66sw86pykknrv9ej7.voting".parse().unwrap();
        assert_eq!(lower, id);

        assert_eq!(
            "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".parse::<ContractId>(),
            Err(PrincipalError::BadContractName(String::new()))
        );
        assert!("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ8.voting"
            .parse::<ContractId>()
            .is_err());
    }

    #[test]
    fn test_parse_history_page() {
        let page: TransactionPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.results.len(), 2);
        let contract = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.voting";
        let call = page.results[0].successful_call_to(contract, "vote").unwrap();
        assert_eq!(call.function_args[0].hex, "0x0100000000000000000000000000000002");
        assert!(page.results[1].successful_call_to(contract, "vote").is_none());
    }

    #[test]
    fn test_read_only_envelopes() {
        let ok: ReadOnlyResponse =
            serde_json::from_str(r#"{"okay": true, "result": "0x0703"}"#).unwrap();
        assert!(ok.okay);
        assert_eq!(ok.result.as_deref(), Some("0x0703"));

        let failed: ReadOnlyResponse =
            serde_json::from_str(r#"{"okay": false, "cause": "Unchecked(NoSuchContract)"}"#)
                .unwrap();
        assert!(!failed.okay);
        assert!(failed.cause.unwrap().contains("NoSuchContract"));
    }

    #[test]
    fn test_contract_id_parse() {
        let id: ContractId = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.voting"
            .parse()
            .unwrap();
        assert_eq!(id.name, "voting");
        assert_eq!(id.to_string(), "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.voting");
        assert!("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7"
            .parse::<ContractId>()
            .is_err());
    }

    #[test]
    fn test_balance_display() {
        let b = AccountBalance::from_micro_stx(2_500_000);
        assert_eq!(b.stx_balance, 2.5);
    }
}
