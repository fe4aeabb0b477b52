//! eevee-rs entry point.
//!
//! Loads configuration, prepares the database, reconciles the emote registry
//! and keeps it alive until the process is asked to stop. The chat transport
//! and command dispatch attach to the registry built here.
//!
//! The container pool wired here is [`MemoryContainer`], which forgets its
//! assets on restart while emote records persist. A deployment replaces it
//! with a platform-backed [`EmoteContainer`] from the transport layer.

use std::sync::Arc;

use eevee_common::Config;
use eevee_core::{AssetFetcher, EmoteContainer, EmoteRegistry, HttpAssetFetcher, MemoryContainer};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "eevee=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match std::env::var("EEVEE_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::load()?,
    };
    init_tracing(config.log.json);
    config.validate()?;

    info!("Starting eevee-rs...");

    // Connect to database
    let db = eevee_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    eevee_db::migrate(&db).await?;
    info!("Migrations completed");

    // Storage pool, in configured placement order
    let containers: Vec<Arc<dyn EmoteContainer>> = config
        .containers
        .iter()
        .map(|c| Arc::new(MemoryContainer::from_config(c)) as Arc<dyn EmoteContainer>)
        .collect();
    warn!(
        containers = containers.len(),
        "Using in-memory containers; hosted assets do not survive a restart"
    );
    let fetcher: Arc<dyn AssetFetcher> =
        Arc::new(HttpAssetFetcher::new(config.registry.transfer_timeout())?);

    let registry = Arc::new(
        EmoteRegistry::bootstrap(Arc::new(db), &config.registry, containers, fetcher).await?,
    );
    let stats = registry.stats().await;
    info!(
        emotes = stats.emotes,
        aliases = stats.aliases,
        containers = config.containers.len(),
        "Emote registry ready"
    );

    // Expired cooldown entries are dropped periodically
    let janitor = {
        let registry = Arc::clone(&registry);
        let period = registry.cooldown().window().max(std::time::Duration::from_secs(1)) * 10;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let pruned = registry.cooldown().prune();
                if pruned > 0 {
                    tracing::debug!(pruned, "Pruned cooldown entries");
                }
            }
        })
    };

    shutdown_signal().await;
    janitor.abort();

    info!("Shutdown complete");

    Ok(())
}
