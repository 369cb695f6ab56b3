//! Template preview rendering
//!
//! Submitted templates are rendered with handlebars against a fixed page
//! context. Output is not HTML-escaped, so whatever the template produces
//! lands in the preview page as-is.

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{Value, json};
use std::net::SocketAddr;

use super::AdminState;
use super::audit::STAGE_FLAG;
use crate::error::{GalleryError, Result};
use crate::templating::register_helpers;

const DEFAULT_IMAGE_URL: &str = "https://example.org/sample.jpg";
const BANNED_IMAGE_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];
const FLAG_OBSERVED_NOTE: &str = "\n\n-- Fake flag observed by server --";

/// Variables visible to submitted templates
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub username: String,
    pub image_url: String,
    pub server_time: String,
    pub notice: String,
}

impl RenderContext {
    pub fn new(image_url: Option<&str>) -> Self {
        Self {
            username: "guest_user".to_string(),
            image_url: image_url.unwrap_or(DEFAULT_IMAGE_URL).to_string(),
            server_time: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            notice: "This is an intentionally vulnerable sandbox for CTF use.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderRequest {
    pub template: String,
    pub image_url: Option<String>,
}

impl RenderRequest {
    /// Pull `template`/`image_url` from a form or JSON body, else use the raw text
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Self {
        let content_type = content_type.unwrap_or("").to_ascii_lowercase();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let mut template = None;
            let mut image_url = None;
            for (k, v) in url::form_urlencoded::parse(body) {
                match k.as_ref() {
                    "template" if template.is_none() => template = Some(v.into_owned()),
                    "image_url" if image_url.is_none() => image_url = Some(v.into_owned()),
                    _ => {}
                }
            }
            return Self {
                template: template.unwrap_or_default(),
                image_url: image_url.filter(|u| !u.is_empty()),
            };
        }

        if content_type.starts_with("application/json")
            && let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(body)
            && let Some(template) = obj.get("template").and_then(Value::as_str)
        {
            return Self {
                template: template.to_string(),
                image_url: obj
                    .get("image_url")
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string),
            };
        }

        Self {
            template: String::from_utf8_lossy(body).into_owned(),
            image_url: None,
        }
    }
}

/// http(s) with a host that is not the admin box itself
pub fn is_safe_image_url(candidate: &str) -> bool {
    let Ok(url) = url::Url::parse(candidate) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let host = match url.host() {
        Some(url::Host::Domain(d)) => d.to_ascii_lowercase(),
        Some(url::Host::Ipv4(ip)) => ip.to_string(),
        Some(url::Host::Ipv6(ip)) => ip.to_string(),
        None => return false,
    };
    !host.is_empty() && !BANNED_IMAGE_HOSTS.contains(&host.as_str())
}

pub struct TemplateRenderer {
    hb: Handlebars<'static>,
    forbidden: Vec<String>,
    max_bytes: usize,
}

impl TemplateRenderer {
    pub fn new(forbidden_keywords: &[String], max_bytes: usize) -> Self {
        let mut hb = Handlebars::new();
        hb.register_escape_fn(handlebars::no_escape);
        register_helpers(&mut hb);
        Self {
            hb,
            forbidden: forbidden_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            max_bytes,
        }
    }

    /// Largest request body that can still carry a template under the limit
    ///
    /// Percent-encoding at most triples a template, so anything beyond that
    /// is rejected while reading instead of being buffered whole.
    pub fn body_limit(&self) -> usize {
        self.max_bytes.saturating_mul(3).saturating_add(4096)
    }

    pub fn check_size(&self, template: &str) -> Result<()> {
        if template.len() > self.max_bytes {
            return Err(too_large());
        }
        Ok(())
    }

    pub fn check_keywords(&self, template: &str) -> Result<()> {
        let lower = template.to_lowercase();
        match self.forbidden.iter().find(|k| lower.contains(k.as_str())) {
            Some(k) => Err(GalleryError::template(format!("forbidden keyword '{k}'"))),
            None => Ok(()),
        }
    }

    pub fn render(&self, template: &str, context: &RenderContext) -> Result<String> {
        self.check_keywords(template)?;
        Ok(self.hb.render_template(template, context)?)
    }
}

fn too_large() -> GalleryError {
    GalleryError::TooLarge {
        message: "Template too large".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Html,
    Json,
}

fn remote_of(connect: Option<ConnectInfo<SocketAddr>>) -> String {
    connect
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn read_body(state: &AdminState, body: Body) -> Result<Bytes> {
    axum::body::to_bytes(body, state.renderer.body_limit())
        .await
        .map_err(|e| {
            tracing::debug!("render body rejected: {}", e);
            too_large()
        })
}

async fn process(
    state: &AdminState,
    headers: &HeaderMap,
    body: Body,
    remote: &str,
    flavor: Flavor,
) -> Result<String> {
    let body = read_body(state, body).await?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request = RenderRequest::from_body(content_type, &body);
    state.renderer.check_size(&request.template)?;

    let image_url = request
        .image_url
        .as_deref()
        .filter(|u| is_safe_image_url(u));

    state
        .submissions
        .record(remote, &request.template, flavor == Flavor::Json)
        .await;

    let context = RenderContext::new(image_url);
    let mut rendered = state.renderer.render(&request.template, &context)?;

    if flavor == Flavor::Html && rendered.contains(STAGE_FLAG) {
        state.submissions.mark_flag(remote).await;
        rendered.push_str(FLAG_OBSERVED_NOTE);
    }
    Ok(rendered)
}

fn preview_page(rendered: &str) -> String {
    format!(
        r#"
<!doctype html><html><head><meta charset="utf-8"><title>Rendered Preview</title></head><body>
<h2>Rendered output</h2>
<div style="padding:12px;border:1px solid #ddd;background:#fff">{rendered}</div>
<hr>
<p><a href="/render">Back to template preview</a></p>
</body></html>
"#
    )
}

pub async fn render_page_handler(State(state): State<AdminState>) -> Response {
    let page = state.config.pages_dir.join("render_page.html");
    match tokio::fs::read_to_string(&page).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("render page {} unavailable: {}", page.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Render page not found (operator error).",
            )
                .into_response()
        }
    }
}

pub async fn render_html_handler(
    State(state): State<AdminState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let remote = remote_of(connect);
    match process(&state, &headers, body, &remote, Flavor::Html).await {
        Ok(rendered) => Html(preview_page(&rendered)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn render_json_handler(
    State(state): State<AdminState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let remote = remote_of(connect);
    match process(&state, &headers, body, &remote, Flavor::Json).await {
        Ok(rendered) => Json(json!({ "rendered_html": rendered })).into_response(),
        Err(e) => {
            let message = match &e {
                GalleryError::TooLarge { message } | GalleryError::Template { message } => {
                    message.clone()
                }
                other => other.to_string(),
            };
            (e.status(), Json(json!({ "error": message }))).into_response()
        }
    }
}
