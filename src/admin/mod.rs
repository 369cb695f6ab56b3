//! Internal admin API: metadata, template files, rendering, and OpenAPI docs

pub mod audit;
pub mod openapi;
pub mod render;
pub mod templates;

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AdminConfig;
use crate::error::Result;

use audit::SubmissionLog;
use render::TemplateRenderer;

/// Shared state for the admin API
#[derive(Clone)]
pub struct AdminState {
    pub config: Arc<AdminConfig>,
    pub renderer: Arc<TemplateRenderer>,
    pub submissions: Arc<SubmissionLog>,
}

impl AdminState {
    pub fn new(config: AdminConfig) -> Self {
        let renderer = TemplateRenderer::new(&config.forbidden_keywords, config.max_template_bytes);
        let submissions = SubmissionLog::new(&config);
        Self {
            config: Arc::new(config),
            renderer: Arc::new(renderer),
            submissions: Arc::new(submissions),
        }
    }
}

/// Admin metadata
pub async fn admin_handler() -> impl IntoResponse {
    Json(json!({
        "service": "admin",
        "version": "1.0.0",
        "notes": "Those who look beyond the surface might find hidden paths. Try Harder"
    }))
}

/// Service health
pub async fn status_handler() -> impl IntoResponse {
    Json(json!({ "ok": true, "component": "admin-api" }))
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/admin", get(admin_handler))
        .route("/status", get(status_handler))
        .route("/templates/list", get(templates::list_handler))
        .route("/templates/get", get(templates::get_handler))
        .route(
            "/render",
            get(render::render_page_handler).post(render::render_html_handler),
        )
        .route("/render/json", post(render::render_json_handler))
        .route("/openapi", get(openapi::swagger_handler))
        .route("/openapi/swagger", get(openapi::swagger_handler))
        .route("/openapi/openapi.json", get(openapi::openapi_json_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the admin API
pub async fn start_admin_server(config: AdminConfig) -> Result<()> {
    audit::bootstrap(&config).await?;
    let bind = config.bind;
    if !config.forbidden_keywords.is_empty() {
        tracing::info!(
            "render keyword filter active ({} keywords)",
            config.forbidden_keywords.len()
        );
    }
    let state = AdminState::new(config);
    crate::http::serve(router(state), bind, "admin-api").await
}
