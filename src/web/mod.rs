//! Web layer module
//!
//! JSON API for browsing bookmarks plus the static route that serves cached
//! favicons. Listing a page is what drives favicon acquisition: the handler
//! answers with what is known now and resolves the rest in the background.

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    favicon::FaviconPipeline,
    models::Bookmark,
    repositories::BookmarkRepository,
};

pub mod handlers;
pub mod responses;

pub use responses::{ApiResponse, PaginatedResponse, handle_error, handle_result};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repository: Arc<dyn BookmarkRepository>,
    pub pipeline: FaviconPipeline,
    /// Cancelled on shutdown; background favicon runs use child tokens
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        repository: Arc<dyn BookmarkRepository>,
        pipeline: FaviconPipeline,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repository,
            pipeline,
            shutdown,
        }
    }

    /// Run the favicon pipeline over `records` without blocking the caller
    pub fn spawn_favicon_run(&self, mut records: Vec<Bookmark>) {
        if records.iter().all(Bookmark::is_resolved) {
            return;
        }

        let pipeline = self.pipeline.clone();
        let token = self.shutdown.child_token();
        tokio::spawn(async move {
            let report = pipeline.run_with_cancellation(&mut records, token).await;
            debug!("Background favicon run complete: {:?}", report);
        });
    }
}

pub fn router(state: AppState) -> Router {
    let favicon_dir = state.config.storage.favicon_dir();
    let cache_prefix = state
        .config
        .favicon
        .cache_url_prefix
        .trim_end_matches('/')
        .to_string();

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/bookmarks", get(handlers::list_bookmarks))
        .route("/api/v1/bookmarks/{id}", get(handlers::get_bookmark))
        .route("/api/v1/favicons/refresh", post(handlers::refresh_favicons));

    let app = if cache_prefix.is_empty() {
        api.fallback_service(ServeDir::new(favicon_dir))
    } else {
        api.nest_service(&cache_prefix, ServeDir::new(favicon_dir))
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    host: String,
    port: u16,
}

impl WebServer {
    pub fn new(state: AppState) -> Self {
        let host = state.config.web.host.clone();
        let port = state.config.web.port;
        Self {
            app: router(state),
            host,
            port,
        }
    }

    /// Serve until `cancellation_token` fires, then drain connections
    pub async fn serve_with_cancellation(self, cancellation_token: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("Failed to bind to {}:{}", self.host, self.port))?;
        info!("Web server listening on http://{}", listener.local_addr()?);

        let shutdown = async move {
            cancellation_token.cancelled().await;
            info!("Web server received cancellation signal, shutting down gracefully");
        };

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Cancel `token` on SIGTERM or SIGINT
pub async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
                    _ = token.cancelled() => return,
                }
            }
            _ => {
                warn!("Failed to install signal handlers, falling back to Ctrl+C");
                tokio::select! {
                    result = tokio::signal::ctrl_c() => if let Err(e) = result {
                        warn!("Ctrl+C handler failed: {}", e);
                        return;
                    },
                    _ = token.cancelled() => return,
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Ctrl+C handler failed: {}", e);
                    return;
                }
                info!("Received Ctrl+C, shutting down gracefully");
            }
            _ = token.cancelled() => return,
        }
    }

    token.cancel();
}
