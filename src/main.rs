mod api;
mod config;
mod engine;
mod error;
mod ingest;
mod store;
mod stream;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, StoreKind};
use crate::engine::Aggregator;
use crate::error::Result;
use crate::ingest::IngestLoop;
use crate::store::{KeySpace, MemoryStore, StatsStore, ValkeyStore};
use crate::stream::KafkaSource;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Statistics store ---
    let store: Arc<dyn StatsStore> = match cfg.store_kind {
        StoreKind::Valkey => Arc::new(ValkeyStore::connect(&cfg.valkey_url()).await?),
        StoreKind::Memory => MemoryStore::new(),
    };
    let keys = KeySpace::new(cfg.key_prefix.clone());
    info!(
        store = store.backend_name(),
        prefix = cfg.key_prefix.as_deref().unwrap_or(""),
        history_limit = cfg.price_history_limit,
        "Statistics store ready"
    );

    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let aggregator = Aggregator::new(Arc::clone(&store), keys.clone(), cfg.price_history_limit);

    // --- Stream source: a broker we cannot reach at startup is fatal ---
    let source = KafkaSource::connect(&cfg)?;

    // HTTP API server
    let api_state = ApiState {
        store: Arc::clone(&store),
        keys,
        health: Arc::clone(&health),
        latency: Arc::clone(&latency),
        history_limit: cfg.price_history_limit,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP API stopped: {e}");
        }
    });

    // Ingestion runs on this task until the process is told to stop.
    let ingest = IngestLoop::new(
        source,
        aggregator,
        health,
        latency,
        Duration::from_millis(cfg.read_backoff_ms),
    );
    tokio::select! {
        _ = ingest.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping consumer");
        }
    }

    Ok(())
}
