//! Public-facing image gallery with the server-side fetch proxy

pub mod gallery;
pub mod proxy;
pub mod rewrite;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::PublicConfig;
use crate::error::{GalleryError, Result};
use crate::ssrf::{HostResolver, SsrfPolicy, SystemResolver};

use gallery::Gallery;
use rewrite::RewriteTargets;

/// Shared state for the public app
#[derive(Clone)]
pub struct PublicState {
    pub config: Arc<PublicConfig>,
    pub policy: Arc<SsrfPolicy>,
    pub resolver: Arc<dyn HostResolver>,
    pub client: reqwest::Client,
    pub gallery: Arc<Gallery>,
    pub rewrite: Arc<RewriteTargets>,
}

impl PublicState {
    pub fn new(config: PublicConfig) -> Result<Self> {
        Self::with_resolver(config, Arc::new(SystemResolver))
    }

    pub fn with_resolver(config: PublicConfig, resolver: Arc<dyn HostResolver>) -> Result<Self> {
        let policy = SsrfPolicy::new(
            &config.allowed_networks,
            config.allowed_hostnames.iter().cloned(),
        )?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| GalleryError::Config {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        let rewrite = RewriteTargets::from_spec_url(&config.spec_url);
        Ok(Self {
            config: Arc::new(config),
            policy: Arc::new(policy),
            resolver,
            client,
            gallery: Arc::new(Gallery::new()?),
            rewrite: Arc::new(rewrite),
        })
    }
}

pub fn router(state: PublicState) -> Router {
    let thumbs = ServeDir::new(&state.config.thumbs_dir);
    Router::new()
        .route("/", get(gallery::index_handler))
        .route("/status", get(gallery::status_handler))
        .route(
            "/fetch",
            get(proxy::fetch_handler).options(proxy::fetch_preflight),
        )
        .nest_service("/static/thumbs", thumbs)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the public app
pub async fn start_public_server(config: PublicConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.thumbs_dir).await?;
    let bind = config.bind;
    let state = PublicState::new(config)?;
    tracing::info!(
        "SSRF filter: {} networks, {} hostnames",
        state.policy.allowed_networks.len(),
        state.policy.allowed_hostnames.len()
    );
    crate::http::serve(router(state), bind, "public-app").await
}
