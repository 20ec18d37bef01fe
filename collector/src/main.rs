use activity_relay::config::RelayConfig;
use activity_relay::{CheckpointStore, DurableExecutionHost, SqliteHost};
use anyhow::{Context, Result};
use relay_collector::api::create_router;
use relay_collector::sink::{select_transform, Forwarder};
use relay_collector::source::{ActivityClient, TokenClient};
use relay_collector::{AlarmDriver, Collector, Scheduler};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_collector=info,activity_relay=info".into()),
        )
        .init();

    info!("Relay collector starting...");

    let config = RelayConfig::load().context("Failed to load configuration")?;

    info!(
        source = %config.source.base_url,
        db_path = %config.storage.db_path,
        instance = %config.collector.instance_name,
        poll_interval_secs = config.collector.poll_interval_secs,
        test_mode = config.sink.test_mode,
        api_port = config.api.port,
        "Configuration loaded"
    );

    // Durable state; holds an exclusive lock for the process lifetime
    let host: Arc<dyn DurableExecutionHost> = Arc::new(
        SqliteHost::open(&config.storage.db_path, &config.collector.instance_name)
            .context("Failed to open durable state")?,
    );
    info!("Durable state opened");

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.source.request_timeout_secs))
        .user_agent(concat!("relay-collector/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let tokens = Arc::new(TokenClient::new(
        http_client.clone(),
        config.source.base_url.clone(),
        config.source.client_id.clone(),
        config.source.client_secret.clone(),
    ));
    let source = Arc::new(ActivityClient::new(
        http_client.clone(),
        config.source.base_url.clone(),
    ));
    let sink = Arc::new(Forwarder::new(
        http_client,
        config.sink.webhook_url.clone(),
        select_transform(config.sink.transform_enabled),
        config.sink.test_mode,
    ));
    let scheduler = Scheduler::new(
        Arc::clone(&host),
        Duration::from_secs(config.collector.poll_interval_secs),
    );

    let collector = Arc::new(Collector::new(
        tokens,
        source,
        sink,
        CheckpointStore::new(Arc::clone(&host)),
        scheduler,
    ));

    // Resume polling if a previous run died between firing and rearming
    let pending = host.pending_wake().context("Failed to read pending wake")?;
    collector
        .resume(pending)
        .context("Failed to resume polling")?;

    let alarm_handle = AlarmDriver::new(
        Arc::clone(&host),
        Arc::clone(&collector),
        Duration::from_millis(config.collector.alarm_tick_millis),
    )
    .start();

    // Start HTTP API server
    let router = create_router(Arc::clone(&collector));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api.port))
        .await
        .context("Failed to bind collector API port")?;
    info!(port = config.api.port, "Collector API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Collector API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    alarm_handle.abort();
    info!("Relay collector stopped");

    Ok(())
}
