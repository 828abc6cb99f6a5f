//! # transcribe-server - Main Application Entry Point
//!
//! HTTP service for asynchronous speech transcription. Clients submit
//! transcription or model-download jobs, get a job handle back immediately,
//! and poll for the result.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **error**: Error taxonomy and HTTP error responses
//! - **jobs**: Job records, their state machines and the job registry
//! - **catalog**: Known and downloaded models, model file storage
//! - **transcription**: Audio decoding and Whisper inference
//! - **workflows**: Background tasks driving jobs to completion
//! - **state**: Shared state injected into handlers
//! - **handlers / health / middleware**: The HTTP surface

mod catalog;
mod config;
mod error;
mod handlers;
mod health;
mod jobs;
mod middleware;
mod progress;
mod state;
mod transcription;
mod workflows;

#[cfg(test)]
mod testing;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use catalog::HubModelStore;
use config::AppConfig;
use state::AppState;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::WhisperTranscriber;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate()?;

    info!("Starting transcribe-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let store = Arc::new(HubModelStore::new(
        &config.models.data_dir,
        config.models.hub_endpoint.clone(),
    ));
    let device = transcription::select_device(config.device_preference());
    let transcriber = Arc::new(WhisperTranscriber::new(device));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let cors_origins = config.server.cors_origins.clone();
    let app_state = AppState::new(config, store, transcriber);

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure_routes)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize tracing.
///
/// `RUST_LOG` controls what gets logged; defaults to
/// `transcribe_server=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcribe_server=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
