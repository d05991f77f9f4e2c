//! `reqwest` client for the Hiro Stacks API.
//!
//! One outbound request per call; batching and rate limiting live in the
//! catalog sync, caching in `cache`.

use super::types::{BalancesResponse, ReadOnlyRequest, ReadOnlyResponse};
use super::*;
use crate::clarity::decode_hex;
use crate::config::HiroConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const HEADER_API_KEY: &str = "x-api-key";

pub struct HiroClient {
    client: reqwest::Client,
    base_url: String,
    contract: ContractId,
}

impl HiroClient {
    pub fn new(config: &HiroConfig, contract: ContractId) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(key)
                .map_err(|e| ApiError::Validation(format!("api key: {e}")))?;
            headers.insert(HEADER_API_KEY, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            contract,
        })
    }

    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    /// Read the body and map non-2xx to `Upstream`.
    async fn read_body(resp: reqwest::Response) -> Result<String, ApiError> {
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if !(200..300).contains(&status) {
            if status == 429 {
                warn!(status, "Hiro API rate limited");
            }
            return Err(ApiError::Upstream { status, body });
        }
        Ok(body)
    }

    fn parse<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|e| ApiError::Upstream {
            status: 200,
            body: format!("malformed response: {e}"),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");
        let resp = self.client.get(&url).send().await?;
        let body = Self::read_body(resp).await?;
        Self::parse(&body)
    }
}

impl StacksApi for HiroClient {
    async fn call_read_only(
        &self,
        function: ReadFunction,
        args: &[String],
        sender: &str,
    ) -> Result<ClarityValue, ApiError> {
        let url = format!(
            "{}/v2/contracts/call-read/{}/{}/{}",
            self.base_url, self.contract.address, self.contract.name, function
        );
        let request = ReadOnlyRequest {
            sender,
            arguments: args,
        };

        debug!(function = %function, args = args.len(), "call-read");
        let resp = self.client.post(&url).json(&request).send().await?;
        let body = Self::read_body(resp).await?;
        let envelope: ReadOnlyResponse = Self::parse(&body)?;

        if !envelope.okay {
            return Err(ApiError::Upstream {
                status: 200,
                body: envelope.cause.unwrap_or_else(|| "read-only call failed".into()),
            });
        }
        let result = envelope.result.ok_or_else(|| ApiError::Upstream {
            status: 200,
            body: "read-only call returned no result".into(),
        })?;

        Ok(decode_hex(&result)?)
    }

    async fn address_transactions(
        &self,
        principal: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TransactionPage, ApiError> {
        let limit = limit.min(MAX_PAGE_SIZE);
        self.get_json(&format!(
            "/extended/v1/address/{principal}/transactions?limit={limit}&offset={offset}"
        ))
        .await
    }

    async fn chain_info(&self) -> Result<ChainInfo, ApiError> {
        self.get_json("/v2/info").await
    }

    async fn account_balance(&self, principal: &str) -> Result<AccountBalance, ApiError> {
        let resp: BalancesResponse = self
            .get_json(&format!("/extended/v1/address/{principal}/balances"))
            .await?;
        let micro_stx = resp.stx.balance.parse::<u128>().map_err(|e| ApiError::Upstream {
            status: 200,
            body: format!("malformed balance `{}`: {e}", resp.stx.balance),
        })?;
        Ok(AccountBalance::from_micro_stx(micro_stx))
    }

    async fn network_status(&self) -> Result<NetworkStatus, ApiError> {
        self.get_json("/extended/v1/status").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const CONTRACT_ADDRESS: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";
    const CALL_READ: &str = "/v2/contracts/call-read/:address/:name/:function";

    /// Serve `router` on an ephemeral local port and point a client at it.
    async fn client_for(router: Router) -> HiroClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        client_at(format!("http://{addr}"))
    }

    fn client_at(api_url: String) -> HiroClient {
        let config = HiroConfig {
            api_url,
            api_key: Some("secret".into()),
            ..Default::default()
        };
        HiroClient::new(&config, ContractId::new(CONTRACT_ADDRESS, "voting")).unwrap()
    }

    fn read_ok(result: &str) -> Json<Value> {
        Json(json!({ "okay": true, "result": result }))
    }

    #[tokio::test]
    async fn test_call_read_decodes_result() {
        let count = ClarityValue::ResponseOk(Box::new(ClarityValue::UInt(3))).to_hex();
        let router = Router::new().route(
            CALL_READ,
            post(
                move |Path((address, name, function)): Path<(String, String, String)>,
                      headers: AxumHeaders,
                      Json(body): Json<Value>| async move {
                    let authorized = headers
                        .get(HEADER_API_KEY)
                        .is_some_and(|v| v.as_bytes() == b"secret");
                    if !authorized
                        || address != CONTRACT_ADDRESS
                        || name != "voting"
                        || function != "get-poll-count"
                        || body["sender"] != CONTRACT_ADDRESS
                    {
                        return Err(StatusCode::BAD_REQUEST);
                    }
                    Ok(read_ok(&count))
                },
            ),
        );
        let client = client_for(router).await;

        let value = client
            .call_read_only(ReadFunction::GetPollCount, &[], CONTRACT_ADDRESS)
            .await
            .unwrap();
        assert_eq!(value.unwrap_ok().as_uint(), Some(3));
    }

    #[tokio::test]
    async fn test_okay_false_is_upstream() {
        let router = Router::new().route(
            CALL_READ,
            post(|| async { Json(json!({ "okay": false, "cause": "NoSuchContract" })) }),
        );
        let client = client_for(router).await;

        let err = client
            .call_read_only(ReadFunction::GetPoll, &["0x01".into()], CONTRACT_ADDRESS)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Upstream {
                status: 200,
                body: "NoSuchContract".into()
            }
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream() {
        let router = Router::new().route(
            CALL_READ,
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let client = client_for(router).await;

        let err = client
            .call_read_only(ReadFunction::GetPollCount, &[], CONTRACT_ADDRESS)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Upstream {
                status: 429,
                body: "slow down".into()
            }
        );
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_bad_result_hex_is_decode_error() {
        let router = Router::new().route(CALL_READ, post(|| async { read_ok("0xzz") }));
        let client = client_for(router).await;

        let err = client
            .call_read_only(ReadFunction::GetPollCount, &[], CONTRACT_ADDRESS)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)), "{err}");
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_at(format!("http://{addr}"));

        let err = client.chain_info().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)), "{err}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_history_page_size_clamped() {
        let router = Router::new().route(
            "/extended/v1/address/:principal/transactions",
            get(
                |Path(principal): Path<String>, Query(q): Query<HashMap<String, String>>| async move {
                    let limit: u32 = q.get("limit").and_then(|l| l.parse().ok()).unwrap_or(0);
                    let offset: u32 = q.get("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
                    Json(json!({
                        "limit": limit,
                        "offset": offset,
                        "total": 0,
                        "results": [{ "tx_id": principal }],
                    }))
                },
            ),
        );
        let client = client_for(router).await;

        let page = client
            .address_transactions(CONTRACT_ADDRESS, 200, 100)
            .await
            .unwrap();
        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert_eq!(page.offset, 100);
        assert_eq!(page.results[0].tx_id, CONTRACT_ADDRESS);
    }

    #[tokio::test]
    async fn test_balance_parsed_from_micro_stx() {
        let router = Router::new()
            .route(
                "/extended/v1/address/:principal/balances",
                get(|| async { Json(json!({ "stx": { "balance": "1500000" } })) }),
            )
            .route(
                "/extended/v1/status",
                get(|| async { Json(json!({ "status": "ready" })) }),
            );
        let client = client_for(router).await;

        let balance = client.account_balance(CONTRACT_ADDRESS).await.unwrap();
        assert_eq!(balance, AccountBalance::from_micro_stx(1_500_000));
        assert_eq!(balance.stx_balance, 1.5);
        assert_eq!(client.network_status().await.unwrap().status, "ready");
    }
}
