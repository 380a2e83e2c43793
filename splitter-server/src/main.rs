//! Expense Splitter Server
//!
//! Live resource streams and cascade deletes for the expense splitter.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{BusSettings, ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use splitter_core::cascade::CascadeDelete;
use splitter_core::config::ConfigStore;
use splitter_core::events::{Bus, LocalBus, NatsBus};
use splitter_core::framework::DatabaseProcessor;
use splitter_core::processors::OutboxRelay;
use splitter_core::rates::HttpRateProvider;
use splitter_core::streaming::ExchangeRateSource;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Expense Splitter - live resource notification server
#[derive(Parser, Debug)]
#[command(name = "splitter-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./splitter-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting splitter-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let bus = connect_bus(&loaded_config.bus).await?;
    let db = DatabaseProcessor {
        pool: db_pool.clone(),
    };

    // Reloadable settings
    let streaming = ConfigStore::new(loaded_config.streaming);
    let outbox = ConfigStore::new(loaded_config.outbox);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cascade = Arc::new(CascadeDelete::new(
        db.clone(),
        bus.clone(),
        loaded_config.router.clone(),
        loaded_config.publish_mode,
    ));

    // The relay also drains rows left over from an earlier outbox run.
    let relay_handle = tokio::spawn(
        OutboxRelay::new(db.clone(), bus.clone(), cascade.relay_signal())
            .run(shutdown_rx.clone(), outbox.subscribe()),
    );
    tracing::info!(mode = ?cascade.mode(), "Cascade delete publish mode");

    let rate_provider = HttpRateProvider::new(
        loaded_config.rates_base_url.clone(),
        loaded_config.rates_timeout,
    )
    .map_err(|e| {
        tracing::error!("Failed to build the exchange rate client: {}", e);
        e
    })?;
    let rates = Arc::new(ExchangeRateSource::new(db.clone(), rate_provider));

    // Create application state
    let state = AppState {
        db,
        bus,
        router: loaded_config.router.clone(),
        error_domain: Arc::from(loaded_config.error_domain.as_str()),
        streaming: streaming.clone(),
        cascade,
        rates,
        shutdown: shutdown_rx,
    };

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(config_loader, streaming, outbox);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen, shutdown_tx).await;

    // Stop background tasks
    reload_notify.notify_one();
    if let Err(e) = relay_handle.await {
        tracing::error!("Outbox relay task failed: {}", e);
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Connect to NATS when a url is configured, otherwise use the in-process bus.
async fn connect_bus(settings: &BusSettings) -> anyhow::Result<Bus> {
    match &settings.url {
        Some(url) => {
            let bus = NatsBus::connect(url, settings.subscription_capacity)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to the bus: {}", e);
                    e
                })?;
            Ok(Bus::Nats(bus))
        }
        None => {
            tracing::info!("No bus url configured, using the in-process bus");
            Ok(Bus::Local(LocalBus::new()))
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
