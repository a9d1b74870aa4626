use anyhow::Result;
use common::config::AppConfig;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use ingestion::IngestionPipeline;
use messaging::EventConsumer;
use order_cache::{warm_up, CacheJanitor, OrderCache};
use order_store::{OrderStore, PostgresOrderStore};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod handlers;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    init_telemetry(TelemetryConfig::from_app_config("order-service", &config))?;

    info!(
        port = config.http.port,
        cache_ttl_secs = config.cache.ttl.as_secs(),
        kafka_enabled = config.kafka.is_enabled(),
        jaeger = config.enable_jaeger,
        "Starting order service"
    );

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url())
        .await?;
    info!("Database connected");

    let postgres = PostgresOrderStore::new(pool.clone());
    postgres.migrate().await?;
    let store: Arc<dyn OrderStore> = Arc::new(postgres);

    let cache = Arc::new(OrderCache::new(config.cache.ttl));
    let report = warm_up(store.as_ref(), &cache).await;
    if !report.is_success() {
        warn!("Serving with a cold cache");
    }

    let shutdown = CancellationToken::new();
    let janitor = CacheJanitor::spawn(cache.clone(), shutdown.child_token());

    let consumer_task = start_consumer(&config, store.clone(), cache.clone(), &shutdown);

    let state = AppState::new(store, cache);
    let app = routes::create_router(state, config.http.request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    info!(%addr, "Order service listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(await_shutdown(shutdown.clone()))
        .await;

    // Also stop background work if the server exited on its own.
    shutdown.cancel();

    if let Some(task) = consumer_task {
        if let Err(e) = task.await {
            error!(error = %e, "Consumer task panicked");
        }
    }
    if let Some(janitor) = janitor {
        janitor.shutdown().await;
    }

    pool.close().await;
    info!("Order service stopped");
    shutdown_telemetry();

    served.map_err(|e| {
        error!(error = %e, "Server error");
        e.into()
    })
}

fn start_consumer(
    config: &AppConfig,
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    shutdown: &CancellationToken,
) -> Option<JoinHandle<()>> {
    if !config.kafka.is_enabled() {
        info!("Kafka consumer disabled");
        return None;
    }

    match EventConsumer::new(&config.kafka) {
        Ok(consumer) => {
            let pipeline = Arc::new(IngestionPipeline::new(store, cache));
            Some(tokio::spawn(consumer.run(pipeline, shutdown.child_token())))
        }
        Err(e) => {
            // HTTP keeps serving from the store; ingestion resumes on restart.
            error!(error = %e, "Failed to start Kafka consumer");
            None
        }
    }
}

/// Wait for SIGINT or SIGTERM, then cancel `shutdown`
async fn await_shutdown(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
        () = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
