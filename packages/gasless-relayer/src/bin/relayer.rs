//! Gasless relayer binary.

use gasless_relayer::{create_router, AppState, Config};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting gasless relayer");

    // Nested sections come from the environment as e.g. RELAYER_MAINTENANCE__PERIOD_SECS.
    let config: Config = match config::Config::builder()
        .add_source(config::File::with_name("relayer").required(false))
        .add_source(
            config::Environment::with_prefix("RELAYER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|c| c.try_deserialize())
    {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "FATAL: Config error, fix env vars or relayer.toml");
            std::process::exit(1);
        }
    };

    if std::env::var("RELAYER_API_KEY")
        .map(|k| !k.is_empty())
        .unwrap_or(false)
    {
        info!("API key auth enabled");
    } else {
        warn!("RELAYER_API_KEY not set, /fund-manager/trigger is unprotected (dev mode)");
    }

    info!(
        rpc = %config.rpc_url,
        fallback = %config.fallback_rpc_url,
        mint = %config.token_mint,
        dry_run = config.dry_run,
        "Configuration loaded"
    );

    let bind_address = config.bind_address.clone();
    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "FATAL: Failed to initialize relayer");
            std::process::exit(1);
        }
    };

    state.scheduler.start();
    info!(wallet = %state.wallet.pubkey(), "Relayer ready");

    let app = create_router(state.clone());

    info!(address = %bind_address, "Listening");

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // An in-flight cycle finishes on its own; no new ones are scheduled.
    info!("HTTP server stopped, stopping fund manager...");
    state.scheduler.stop();

    info!("Relayer shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
