//! Tirestock sync daemon.
//!
//! Keeps a file-backed local cache reconciled with the remote inventory
//! backend: periodic sync cycles, change-driven cycles after local
//! writes, and a clean shutdown on Ctrl-C.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tirestock_client::{
    Config, FileBackend, HttpIdentityProvider, HttpRemoteStore, SchedulerConfig, SyncEngine,
    SyncScheduler,
};
use tirestock_engine::{CacheStore, SyncLog};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tirestock_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        api_url = %config.api_url,
        cache = %config.cache_path,
        "starting tirestock syncd"
    );

    let cache = Arc::new(CacheStore::new(Box::new(FileBackend::open(
        &config.cache_path,
    ))));
    let remote = Arc::new(HttpRemoteStore::new(
        &config.api_url,
        &config.api_key,
        config.access_token.clone(),
    ));
    let identity = Arc::new(HttpIdentityProvider::new(
        &config.api_url,
        &config.api_key,
        config.access_token.clone(),
    ));
    let log = Arc::new(SyncLog::new());

    let engine = Arc::new(SyncEngine::new(
        cache.clone(),
        remote,
        identity,
        log.clone(),
    ));
    // The scheduler's first periodic tick fires immediately, so startup
    // begins with a full cycle.
    let scheduler = SyncScheduler::start(engine, &cache, SchedulerConfig::from(&config));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    scheduler.shutdown().await;

    for entry in log.entries() {
        tracing::debug!(table = %entry.table, operation = ?entry.operation, "{}", entry.message);
    }

    Ok(())
}
