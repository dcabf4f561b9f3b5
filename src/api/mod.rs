//! REST API for the media library.
//!
//! Provides HTTP endpoints for:
//! - Resolving and searching remote sources
//! - Acquiring sources into the library
//! - Listing and deleting library items
//! - Range-capable playback of stored media

pub mod error;
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::acquire::Acquirer;
use crate::adapters::{Resolver, Searcher, YtDlpAdapter};
use crate::config::ResolvedConfig;
use crate::library::Library;
use crate::playback::PlaybackServer;

pub use error::ApiError;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub library: Library,
    pub acquirer: Acquirer,
    pub playback: PlaybackServer,
    pub resolver: Arc<dyn Resolver>,
    pub searcher: Arc<dyn Searcher>,
}

impl ApiState {
    /// Wire every component over the configured directories, backed by yt-dlp
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let library = Library::from_config(config);
        let adapter = Arc::new(YtDlpAdapter::new(config.resolver.clone()));

        Self {
            acquirer: Acquirer::new(&library, adapter.clone()),
            playback: PlaybackServer::new(library.blobs().clone()),
            resolver: adapter.clone(),
            searcher: adapter,
            library,
        }
    }
}

/// Build the router with all routes
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/resolve", post(handlers::resolve))
        .route("/info", post(handlers::info))
        .route("/search", post(handlers::search))
        .route("/acquire", post(handlers::acquire))
        .route("/items", get(handlers::list_items))
        .route(
            "/items/:id",
            get(handlers::get_item).delete(handlers::delete_item),
        )
        .route("/stream/:filename", get(handlers::stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP server until it fails
pub async fn serve(config: &ResolvedConfig) -> Result<()> {
    config.ensure_dirs()?;

    let app = build_router(ApiState::from_config(config));

    info!("Downloads directory: {}", config.downloads_dir.display());
    info!("Metadata directory: {}", config.metadata_dir.display());
    info!("Starting HTTP server on {}", config.address);

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.address))?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
