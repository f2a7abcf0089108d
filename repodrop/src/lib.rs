//! # repodrop: form submissions stored in a GitHub repository
//!
//! `repodrop` accepts a form submission over HTTP, classifies its payload by the declared
//! `Content-Type`, and writes it as a file into a GitHub repository through the repository
//! contents API.
//!
//! ## Request Flow
//!
//! A `POST /post-data` request carries the fields `project_name`, `user_name`, `directory` and
//! `data`. The handler
//!
//! 1. rejects the request with a 500 if no GitHub token is configured,
//! 2. rejects it with a 400 if any of the three identifying fields is missing or empty,
//! 3. classifies `data` ([`content::classify`]): JSON content types must parse as JSON and are
//!    re-serialized, everything else is stored as text,
//! 4. builds the path `data/{project_name}/{user_name}/{directory}.{extension}`,
//! 5. writes the file through a [`store::ContentStore`], and
//! 6. answers 201 with the file's URL, or a JSON `{"error": ...}` body.
//!
//! Nothing is cached or retried and no state is kept between requests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use repodrop::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     repodrop::install_crypto_provider();
//!
//!     let args = repodrop::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     repodrop::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod config;
pub mod content;
pub mod errors;
mod openapi;
mod static_assets;
pub mod store;
pub mod telemetry;


#[cfg(test)]
mod test;

use crate::api::handlers::{static_assets as static_handlers, submissions};
use crate::openapi::ApiDoc;
use crate::store::{ContentStore, GithubContents};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// - `config`: Application configuration loaded at startup, never mutated afterwards
/// - `store`: Remote content store; `None` when no access token is configured
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .maybe_store(store)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Option<Arc<dyn ContentStore>>,
}

/// Install the process-wide rustls crypto provider used by the outbound HTTP client.
///
/// Safe to call more than once.
pub fn install_crypto_provider() {
    // Err only means a provider is already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Build the content store described by the configuration, if a token is available.
pub fn build_store(config: &Config) -> anyhow::Result<Option<Arc<dyn ContentStore>>> {
    let Some(token) = config.github.token.clone() else {
        warn!("No GitHub token configured; submissions will fail until GITHUB_TOKEN is set");
        return Ok(None);
    };

    let store: Arc<dyn ContentStore> = Arc::new(GithubContents::new(&config.github, token)?);
    Ok(Some(store))
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;

    Router::new()
        .route("/post-data", post(submissions::post_data))
        .route("/healthz", get(|| async { "OK" }))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .fallback(static_handlers::serve_embedded_asset)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The HTTP application: router plus the configuration it was built from.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        info!(
            owner = %config.github.owner,
            repo = %config.github.repo,
            api_url = %config.github.api_url,
            branch = ?config.github.branch,
            "Starting repodrop"
        );

        let store = build_store(&config)?;
        let state = AppState::builder().config(config.clone()).maybe_store(store).build();

        Ok(Self {
            router: build_router(state),
            config,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "repodrop listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
