//! REST surface built on axum
//!
//! Routes:
//! - `POST /api/extract` - multipart `file` or form field `pdf_url`
//! - `GET /api/health` - liveness probe
//! - `/resources/{job}/{file}` - rendered figures
//! - `/mcp` - MCP over streamable HTTP

mod error;
pub mod handlers;

pub use error::HttpError;

use crate::config::ServerConfig;
use crate::extractor::RESOURCE_MOUNT;
use crate::server::streamable_http_service;
use crate::service::ExtractionService;
use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the full application router
pub fn create_router(service: ExtractionService) -> Router {
    let output_dir = service.config().output_dir.clone();
    let body_limit = service.config().max_upload_bytes;

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/extract", post(handlers::extract))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api", api)
        .nest_service(&format!("/{}", RESOURCE_MOUNT), ServeDir::new(output_dir))
        .nest_service("/mcp", streamable_http_service(service.clone()))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.ensure_dirs()?;
    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        output_dir = %config.output_dir.display(),
        resource_base_url = %config.resource_base_url,
        "starting PDF extraction server"
    );

    let service = ExtractionService::new(config)?;
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "PDF extraction server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
