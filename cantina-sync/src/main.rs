//! cantina-sync - weekly canteen menu sync service
//!
//! Runs the fetch + enrich pipeline and the image garbage collector on their
//! own schedules and serves the enriched menu over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cantina_sync::config::{Args, ServiceConfig};
use cantina_sync::feed::FoodAndCoClient;
use cantina_sync::generation::OpenAiClient;
use cantina_sync::pipeline::{collect_garbage, Pipeline};
use cantina_sync::scheduler::{Scheduler, SharedSyncStatus};
use cantina_sync::{ApiSettings, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Load TOML bootstrap config
    let config_path = args
        .config
        .clone()
        .or_else(cantina_common::config::default_config_path);
    let toml_config = match &config_path {
        Some(path) => cantina_common::config::load_toml_config(path)?,
        None => Default::default(),
    };

    // Initialize tracing (RUST_LOG overrides the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},tower_http=info", toml_config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cantina-sync");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 2: Resolve configuration and data layout
    let config = ServiceConfig::resolve(&args, toml_config)?;
    config
        .layout
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", config.layout.root.display());

    // Step 3: Open or create database
    let db_pool = cantina_common::db::init_database(&config.layout.database_path).await?;
    info!("Database connection established");

    // Step 4: Build pipeline collaborators
    let feed = FoodAndCoClient::new(config.toml.feed.clone())?;
    let generator = OpenAiClient::new(config.openai_api_key.clone(), config.toml.generation.clone())?;
    let pipeline = Pipeline::new(
        db_pool.clone(),
        Arc::new(feed),
        Arc::new(generator),
        config.toml.content_categories(),
        config.layout.asset_dir.clone(),
    );

    if args.once {
        let report = pipeline.run().await?;
        info!(report = ?report, "Pipeline run complete");
        let collected = collect_garbage(&db_pool, &config.layout.asset_dir).await?;
        info!(report = ?collected, "Image cleanup complete");
        return Ok(());
    }

    // Step 5: Start schedules
    let sync_status = SharedSyncStatus::default();
    let scheduler = Scheduler::new(pipeline, &config.toml.schedule, sync_status.clone());
    let cancel = scheduler.cancellation_token();
    let schedules = scheduler.spawn();

    // Step 6: Serve HTTP
    let state = AppState::new(
        db_pool.clone(),
        ApiSettings {
            public_address: config.public_address.clone(),
            admin_key: config.admin_key.clone(),
            asset_dir: config.layout.asset_dir.clone(),
        },
        sync_status,
    );
    let app = cantina_sync::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // A pipeline run in progress finishes before its schedule stops
    info!("Waiting for running schedules to finish");
    cancel.cancel();
    schedules.join().await;
    db_pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
