//! Windmill Monitor gateway binary.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use windmill_core::{ReadingStore, SharedRegistry};
use windmill_gateway::{create_router, AppState, Args, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line args
    let args = Args::parse();

    // Initialize logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "windmill_gateway={lvl},windmill_core={lvl},tower_http=info",
                    lvl = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from(args);
    config.validate()?;

    info!(
        listen = %config.listen_addr,
        data_path = %config.data_path.display(),
        channel_capacity = config.stream.channel_capacity,
        keepalive_secs = config.stream.idle_interval.as_secs(),
        dev_routes = config.dev_routes,
        "Starting Windmill gateway"
    );

    let store = ReadingStore::open(&config.data_path)?;
    info!(readings = store.count(), "Opened reading store");

    let state = AppState::new(store, config.clone());
    let registry = state.registry.clone();
    let store = state.store.clone();

    let app = create_router(state);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    store.flush().await?;
    info!("Gateway shutdown complete");

    Ok(())
}

/// Wait for Ctrl+C, then end every live stream so open connections drain.
async fn shutdown_signal(registry: SharedRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    info!("received shutdown signal");
    registry.close_all();
}
