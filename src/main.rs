use stacks_polls::cache::SystemClock;
use stacks_polls::config::{Config, EventTransportKind};
use stacks_polls::events::{
    EventCallback, EventReconciler, EventTransport, HiroWsTransport, PollingTransport,
};
use stacks_polls::hiro::HiroClient;
use stacks_polls::server;
use stacks_polls::service::VotingService;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const CONFIG_FILE: &str = "stacks-polls.toml";

/// How often the reconciler checks whether its subscription dropped.
const SUBSCRIPTION_CHECK: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = if Path::new(CONFIG_FILE).exists() {
        Config::load(Path::new(CONFIG_FILE))?
    } else {
        Config::from_env()?
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("stacks-polls v{} starting", env!("CARGO_PKG_VERSION"));

    let contract = config.contract_id();
    info!(contract = %contract, api = %config.hiro.api_url, "voting contract");
    if config.hiro.api_key.is_none() {
        warn!("no HIRO_API_KEY set, running on anonymous rate limits");
    }

    let api = Arc::new(HiroClient::new(&config.hiro, contract)?);
    let service = Arc::new(VotingService::new(
        api.clone(),
        &config,
        Arc::new(SystemClock),
    ));

    match config.events.transport {
        EventTransportKind::Websocket => {
            let transport = HiroWsTransport::new(
                config.hiro.ws_url.clone(),
                Duration::from_secs(config.events.ping_interval_secs),
            );
            run(&config, service, transport).await
        }
        EventTransportKind::Polling => {
            let transport = PollingTransport::new(
                api,
                Duration::from_millis(config.events.poll_interval_ms),
                config.events.poll_limit,
            );
            run(&config, service, transport).await
        }
    }
}

/// Serve the API with the event subscription alongside, until ctrl-c.
async fn run<T: EventTransport>(
    config: &Config,
    service: Arc<VotingService<HiroClient>>,
    transport: T,
) -> anyhow::Result<()> {
    let reconciler = Arc::new(EventReconciler::new(
        Arc::new(transport),
        service.contract().to_string(),
    ));

    let maintain = if config.events.enabled {
        let on_event: EventCallback = {
            let service = service.clone();
            Arc::new(move |event| {
                if service.reconcile(&event) {
                    let service = service.clone();
                    tokio::spawn(async move {
                        if let Err(e) = service.refresh_catalog().await {
                            warn!(error = %e, "catalog refresh after event failed");
                        }
                    });
                }
            })
        };
        let reconciler = reconciler.clone();
        Some(tokio::spawn(async move {
            reconciler.maintain(on_event, SUBSCRIPTION_CHECK).await;
        }))
    } else {
        info!("contract events disabled");
        None
    };

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    };
    let result = server::serve(service, &config.server.bind_addr, shutdown).await;

    if let Some(handle) = maintain {
        handle.abort();
    }
    reconciler.disconnect();
    info!("stacks-polls stopped");
    result
}
