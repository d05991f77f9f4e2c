//! Hiro WebSocket notifications.
//!
//! Connects to the extended API socket (wss://api.hiro.so/extended/v1/ws)
//! and subscribes to `address_tx_update` for one principal over JSON-RPC
//! 2.0. Releasing the subscription sends `unsubscribe` before closing.

use super::{ContractEvent, EventError, EventTransport, Subscription, ADDRESS_TX_UPDATE};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SUBSCRIBE_ID: u64 = 1;
const UNSUBSCRIBE_ID: u64 = 2;

pub struct HiroWsTransport {
    ws_url: String,
    ping_interval: Duration,
}

impl HiroWsTransport {
    pub fn new(ws_url: impl Into<String>, ping_interval: Duration) -> Self {
        Self {
            ws_url: ws_url.into(),
            ping_interval,
        }
    }
}

/// JSON-RPC request for `subscribe` / `unsubscribe`.
pub fn rpc_request(id: u64, method: &str, address: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": {
            "event": ADDRESS_TX_UPDATE,
            "address": address,
        },
    })
}

impl EventTransport for HiroWsTransport {
    async fn subscribe(&self, address: &str) -> Result<Subscription, EventError> {
        let url = Url::parse(&self.ws_url)?;
        info!(url = %url, address, "connecting to Hiro WebSocket");

        let (ws_stream, _response) = connect_async(url.as_str()).await?;
        let (mut write, read) = ws_stream.split();

        let request = rpc_request(SUBSCRIBE_ID, "subscribe", address);
        write.send(Message::Text(request.to_string())).await?;
        info!(address, "subscribed to {}", ADDRESS_TX_UPDATE);

        let (event_tx, events) = mpsc::unbounded_channel();
        let (release, release_rx) = oneshot::channel();
        tokio::spawn(run_session(
            write,
            read,
            address.to_string(),
            self.ping_interval,
            event_tx,
            release_rx,
        ));

        Ok(Subscription { events, release })
    }
}

async fn run_session(
    mut write: SplitSink<WsStream, Message>,
    mut read: SplitStream<WsStream>,
    address: String,
    ping_every: Duration,
    event_tx: mpsc::UnboundedSender<ContractEvent>,
    mut release_rx: oneshot::Receiver<()>,
) {
    let mut ping = interval(ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;

    loop {
        tokio::select! {
            _ = &mut release_rx => {
                let request = rpc_request(UNSUBSCRIBE_ID, "unsubscribe", &address);
                if let Err(e) = write.send(Message::Text(request.to_string())).await {
                    warn!(error = %e, "failed to send unsubscribe");
                }
                let _ = write.send(Message::Close(None)).await;
                info!(address = %address, "Hiro WebSocket released");
                break;
            }
            _ = ping.tick() => {
                if let Err(e) = write.send(Message::Ping(vec![])).await {
                    warn!(error = %e, "failed to send ping");
                    break;
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = process_message(&text, &event_tx) {
                        warn!(error = %e, "failed to process notification");
                    }
                }
                Some(Ok(Message::Pong(_))) => debug!("pong received"),
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Hiro WebSocket closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "Hiro WebSocket read error");
                    break;
                }
                None => break,
            },
        }
    }
}

/// Forward `address_tx_update` notifications; log subscription replies.
fn process_message(
    text: &str,
    event_tx: &mpsc::UnboundedSender<ContractEvent>,
) -> Result<(), EventError> {
    let val: Value = serde_json::from_str(text)?;

    if let Some(err) = val.get("error") {
        return Err(EventError::Rejected(err.to_string()));
    }

    match val.get("method").and_then(Value::as_str) {
        Some(ADDRESS_TX_UPDATE) => {
            let params = val.get("params").unwrap_or(&Value::Null);
            match ContractEvent::from_notification(ADDRESS_TX_UPDATE, params) {
                Some(event) => {
                    let _ = event_tx.send(event);
                }
                None => debug!("notification without tx id"),
            }
        }
        Some(other) => debug!(method = other, "ignoring notification"),
        None => debug!(id = ?val.get("id"), "rpc reply"),
    }
    Ok(())
}
