mod auth;
mod pages;
mod relay;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use axum::http::{HeaderValue, Method};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::ingest::{Gateway, GraphAttachmentResolver, KeywordClassifier};
use crate::providers::{default_aggregator, Aggregator};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub aggregator: Arc<Aggregator>,
    pub gateway: Arc<Gateway>,
    pub http: reqwest::Client,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.pool().clone()
    }
}

impl AppState {
    /// Wire the default aggregator and ingestion gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let http = build_http_client(&config)?;
        let aggregator = default_aggregator(&config, http.clone());

        let resolver = GraphAttachmentResolver::new(
            http.clone(),
            &config.graph_api_url,
            config.graph_access_token.clone(),
        );
        let gateway = Gateway::new(
            db.clone(),
            &config.verify_token,
            &config.app_secret,
            Arc::new(KeywordClassifier::new(&config.blocked_words)),
            Arc::new(resolver),
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            aggregator: Arc::new(aggregator),
            gateway: Arc::new(gateway),
            http,
        })
    }
}

/// Shared outbound client with the configured transport timeout.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(crate::constants::USER_AGENT)
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Start the web server and run until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve(
    config: Config,
    db: Database,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.web_host, config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let state = AppState::new(config, db)?;
    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Web server error")?;

    Ok(())
}

/// Create the main application router, nested under the endpoint prefix.
pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.production {
        let origin = HeaderValue::from_str(&state.config.base_url)
            .unwrap_or_else(|_| HeaderValue::from_static("null"));
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
    } else {
        CorsLayer::new().allow_origin(Any).allow_methods(Any)
    };

    let endpoint = state.config.endpoint.clone();
    let routes = routes::router().with_state(state);
    let app = if endpoint.is_empty() {
        routes
    } else {
        Router::new().nest(&endpoint, routes)
    };

    app.layer(cors).layer(TraceLayer::new_for_http())
}
