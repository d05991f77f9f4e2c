//! Push notifications of contract state changes.
//!
//! `EventReconciler` owns the one long-lived subscription and hands each
//! notification to a callback as a `ContractEvent`. It holds no poll state;
//! the callback decides what to invalidate.
//!
//! Transports:
//! - `ws::HiroWsTransport`: JSON-RPC 2.0 `address_tx_update` subscription
//! - `polling::PollingTransport`: periodic history fetch, for when the
//!   socket is unavailable

pub mod polling;
pub mod ws;

use crate::clarity::decode_hex;
use crate::hiro::{ApiError, Transaction};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use polling::PollingTransport;
pub use ws::HiroWsTransport;

/// Notification method and subscription event name.
pub const ADDRESS_TX_UPDATE: &str = "address_tx_update";

const RECONNECT_BASE: Duration = Duration::from_secs(2);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum EventError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("upstream error: {0}")]
    Api(#[from] ApiError),
    #[error("subscription rejected: {0}")]
    Rejected(String),
}

/// A state-changing transaction touching the watched address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEvent {
    pub event: String,
    pub tx_id: String,
    pub tx_status: String,
    pub sender: Option<String>,
    pub function_name: Option<String>,
    /// First call argument when it decodes as a uint (`vote`, `end-poll`).
    pub poll_id: Option<u128>,
}

impl ContractEvent {
    pub fn from_transaction(event: &str, tx: &Transaction) -> Self {
        let call = tx.contract_call.as_ref();
        let poll_id = call
            .and_then(|c| c.function_args.first())
            .and_then(|arg| decode_hex(&arg.hex).ok())
            .and_then(|v| v.as_uint());

        Self {
            event: event.to_string(),
            tx_id: tx.tx_id.clone(),
            tx_status: tx.tx_status.clone(),
            sender: Some(tx.sender_address.clone()).filter(|s| !s.is_empty()),
            function_name: call.map(|c| c.function_name.clone()),
            poll_id,
        }
    }

    /// Reduce `address_tx_update` notification params. `None` when the
    /// notification carries no transaction id.
    pub fn from_notification(method: &str, params: &Value) -> Option<Self> {
        let mut tx: Transaction = params
            .get("tx")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        if let Some(id) = params.get("tx_id").and_then(Value::as_str) {
            tx.tx_id = id.to_string();
        }
        if let Some(status) = params.get("tx_status").and_then(Value::as_str) {
            tx.tx_status = status.to_string();
        }
        if tx.tx_id.is_empty() {
            return None;
        }
        Some(Self::from_transaction(method, &tx))
    }

    pub fn is_success(&self) -> bool {
        self.tx_status == "success"
    }
}

/// A live subscription. Sending on (or dropping) `release` asks the
/// transport to unsubscribe and close.
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<ContractEvent>,
    pub release: oneshot::Sender<()>,
}

pub trait EventTransport: Send + Sync + 'static {
    fn subscribe(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Subscription, EventError>> + Send;
}

pub type EventCallback = Arc<dyn Fn(ContractEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

struct Session {
    release: oneshot::Sender<()>,
    pump: JoinHandle<()>,
}

pub struct EventReconciler<T> {
    transport: Arc<T>,
    address: String,
    state: Arc<AtomicU8>,
    live: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    session: Mutex<Option<Session>>,
}

impl<T: EventTransport> EventReconciler<T> {
    pub fn new(transport: Arc<T>, address: impl Into<String>) -> Self {
        Self {
            transport,
            address: address.into(),
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
            live: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Open the subscription. Returns `Ok(false)` if one is already open or
    /// being opened.
    pub async fn connect(&self, on_event: EventCallback) -> Result<bool, EventError> {
        if self
            .state
            .compare_exchange(
                ConnectionState::Disconnected as u8,
                ConnectionState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!(address = %self.address, "connect skipped, subscription already active");
            return Ok(false);
        }

        let subscription = match self.transport.subscribe(&self.address).await {
            Ok(s) => s,
            Err(e) => {
                self.state
                    .store(ConnectionState::Disconnected as u8, Ordering::Release);
                return Err(e);
            }
        };

        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        // A disconnect while the transport was subscribing wins.
        if self
            .state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Connected as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            let _ = subscription.release.send(());
            return Ok(false);
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.live.store(true, Ordering::Release);
        let pump = tokio::spawn(pump_events(
            subscription.events,
            on_event,
            self.live.clone(),
            self.generation.clone(),
            generation,
            self.state.clone(),
        ));
        *session = Some(Session {
            release: subscription.release,
            pump,
        });

        info!(address = %self.address, "event subscription open");
        Ok(true)
    }

    /// Tear down the subscription. Events arriving afterwards are dropped.
    pub fn disconnect(&self) {
        self.live.store(false, Ordering::Release);
        let session = self
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(session) = session {
            let _ = session.release.send(());
            session.pump.abort();
            info!(address = %self.address, "event subscription closed");
        }
        self.state
            .store(ConnectionState::Disconnected as u8, Ordering::Release);
    }

    /// Keep a subscription open, reconnecting with exponential backoff
    /// whenever the transport drops. Runs until the task is aborted.
    pub async fn maintain(&self, on_event: EventCallback, check_every: Duration) {
        let mut backoff = RECONNECT_BASE;
        loop {
            if self.state() == ConnectionState::Disconnected {
                match self.connect(on_event.clone()).await {
                    Ok(_) => backoff = RECONNECT_BASE,
                    Err(e) => {
                        error!(error = %e, delay = ?backoff, "event subscription failed");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_RECONNECT_DELAY);
                        continue;
                    }
                }
            }
            tokio::time::sleep(check_every).await;
        }
    }
}

async fn pump_events(
    mut events: mpsc::UnboundedReceiver<ContractEvent>,
    on_event: EventCallback,
    live: Arc<AtomicBool>,
    current: Arc<AtomicU64>,
    generation: u64,
    state: Arc<AtomicU8>,
) {
    let is_live = || live.load(Ordering::Acquire) && current.load(Ordering::Acquire) == generation;

    while let Some(event) = events.recv().await {
        if !is_live() {
            debug!(tx_id = %event.tx_id, "dropping event after teardown");
            break;
        }
        debug!(tx_id = %event.tx_id, status = %event.tx_status, "contract event");
        on_event(event);
    }

    if is_live() && live.swap(false, Ordering::AcqRel) {
        warn!("event stream ended, marking disconnected");
        state.store(ConnectionState::Disconnected as u8, Ordering::Release);
    }
}
