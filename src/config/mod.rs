use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::clarity::principal;
use crate::hiro::{ContractId, MAX_PAGE_SIZE};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hiro: HiroConfig,
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HiroConfig {
    /// REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// WebSocket endpoint for address transaction notifications
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Optional API key (raises rate limits) - loaded from env HIRO_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    /// Deployer address of the voting contract.
    #[serde(default = "default_contract_address")]
    pub address: String,
    #[serde(default = "default_contract_name")]
    pub name: String,
    /// Public function whose successful calls count as votes.
    #[serde(default = "default_vote_function")]
    pub vote_function: String,
    /// Sender principal for read-only calls. Defaults to the deployer.
    #[serde(default)]
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Concurrent `get-poll` reads per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fixed pause between batches in milliseconds.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Number of most recent polls fetched by a windowed sync.
    #[serde(default = "default_recent_window")]
    pub recent_window: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Transactions per page (max 50).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Hard cap on pages scanned per request.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

/// Per-domain TTLs in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_poll_count_ttl")]
    pub poll_count_ttl_secs: u64,
    #[serde(default = "default_poll_ttl")]
    pub poll_ttl_secs: u64,
    #[serde(default = "default_catalog_ttl")]
    pub catalog_ttl_secs: u64,
    #[serde(default = "default_user_votes_ttl")]
    pub user_votes_ttl_secs: u64,
    #[serde(default = "default_voters_ttl")]
    pub voters_ttl_secs: u64,
    #[serde(default = "default_chain_info_ttl")]
    pub chain_info_ttl_secs: u64,
    #[serde(default = "default_balance_ttl")]
    pub balance_ttl_secs: u64,
    #[serde(default = "default_network_status_ttl")]
    pub network_status_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTransportKind {
    Websocket,
    Polling,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Subscribe to contract transactions and invalidate caches on arrival.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_transport")]
    pub transport: EventTransportKind,
    /// Polling transport: interval between history fetches.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Polling transport: transactions fetched per tick.
    #[serde(default = "default_poll_limit")]
    pub poll_limit: u32,
    /// WebSocket transport: keepalive ping interval.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_api_url() -> String {
    "https://api.hiro.so".to_string()
}
fn default_ws_url() -> String {
    "wss://api.hiro.so/extended/v1/ws".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_contract_address() -> String {
    "SP33Y8RCP74098JCSPW5QHHCD6QN4H3XS9DM3QXXX".to_string()
}
fn default_contract_name() -> String {
    "Blackadam-Voting-Contract".to_string()
}
fn default_vote_function() -> String {
    "vote".to_string()
}
fn default_batch_size() -> usize {
    5
}
fn default_batch_delay_ms() -> u64 {
    1000
}
fn default_recent_window() -> u64 {
    20
}
fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}
fn default_max_pages() -> u32 {
    4
}
fn default_poll_count_ttl() -> u64 {
    30
}
fn default_poll_ttl() -> u64 {
    30
}
fn default_catalog_ttl() -> u64 {
    10
}
fn default_user_votes_ttl() -> u64 {
    15
}
fn default_voters_ttl() -> u64 {
    15
}
fn default_chain_info_ttl() -> u64 {
    5
}
fn default_balance_ttl() -> u64 {
    10
}
fn default_network_status_ttl() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_transport() -> EventTransportKind {
    EventTransportKind::Websocket
}
fn default_poll_interval_ms() -> u64 {
    10_000
}
fn default_poll_limit() -> u32 {
    10
}
fn default_ping_interval_secs() -> u64 {
    20
}
fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HiroConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            address: default_contract_address(),
            name: default_contract_name(),
            vote_function: default_vote_function(),
            sender: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            recent_window: default_recent_window(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            poll_count_ttl_secs: default_poll_count_ttl(),
            poll_ttl_secs: default_poll_ttl(),
            catalog_ttl_secs: default_catalog_ttl(),
            user_votes_ttl_secs: default_user_votes_ttl(),
            voters_ttl_secs: default_voters_ttl(),
            chain_info_ttl_secs: default_chain_info_ttl(),
            balance_ttl_secs: default_balance_ttl(),
            network_status_ttl_secs: default_network_status_ttl(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transport: default_transport(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_limit: default_poll_limit(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hiro: HiroConfig::default(),
            contract: ContractConfig::default(),
            catalog: CatalogConfig::default(),
            history: HistoryConfig::default(),
            cache: CacheConfig::default(),
            events: EventsConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CatalogConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides (no file needed).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        // Secrets never live in the config file
        if let Ok(key) = std::env::var("HIRO_API_KEY") {
            self.hiro.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("HIRO_API_URL") {
            self.hiro.api_url = url;
        }
        if let Ok(url) = std::env::var("HIRO_WS_URL") {
            self.hiro.ws_url = url;
        }
        if let Ok(address) = std::env::var("POLLS_CONTRACT_ADDRESS") {
            self.contract.address = address;
        }
        if let Ok(name) = std::env::var("POLLS_CONTRACT_NAME") {
            self.contract.name = name;
        }
        if let Ok(addr) = std::env::var("POLLS_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.batch_size == 0 {
            return Err(ConfigError::Invalid("catalog.batch_size must be > 0".into()));
        }
        if self.history.page_size == 0 || self.history.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "history.page_size must be in 1..={MAX_PAGE_SIZE}"
            )));
        }
        if self.history.max_pages == 0 {
            return Err(ConfigError::Invalid("history.max_pages must be > 0".into()));
        }
        if self.contract.address.is_empty() || self.contract.name.is_empty() {
            return Err(ConfigError::Invalid("contract address and name are required".into()));
        }
        format!("{}.{}", self.contract.address, self.contract.name)
            .parse::<ContractId>()
            .map_err(|e| ConfigError::Invalid(format!("contract: {e}")))?;
        if let Some(sender) = &self.contract.sender {
            principal::validate(sender)
                .map_err(|e| ConfigError::Invalid(format!("contract.sender: {e}")))?;
        }
        url::Url::parse(&self.hiro.api_url)
            .map_err(|e| ConfigError::Invalid(format!("hiro.api_url: {e}")))?;
        url::Url::parse(&self.hiro.ws_url)
            .map_err(|e| ConfigError::Invalid(format!("hiro.ws_url: {e}")))?;
        Ok(())
    }

    pub fn contract_id(&self) -> ContractId {
        ContractId::new(&self.contract.address, &self.contract.name)
    }

    /// Sender used for read-only calls.
    pub fn read_sender(&self) -> String {
        self.contract
            .sender
            .clone()
            .unwrap_or_else(|| self.contract.address.clone())
    }
}
