//! Server-side fetch proxy behind the SSRF allow-filter

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use url::{Host, Url};

use super::PublicState;
use super::rewrite::{is_html, rewrite_html};
use crate::config::PublicConfig;
use crate::error::{GalleryError, Result};
use crate::ssrf::{FilterVerdict, HostResolver, SsrfPolicy};

const OPENAPI_SHORTCUT: &str = "http://localhost/openapi.json";

/// A parsed, alias-resolved fetch target
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub url: Url,
    pub hostname: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct FetchParams {
    pub url: Option<String>,
}

fn unsupported() -> GalleryError {
    GalleryError::bad_request("Unsupported URL scheme or missing hostname")
}

/// Hostname as the filter sees it: lowercase, IPv6 without brackets
fn host_name(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(d) if !d.is_empty() => Some(d.to_ascii_lowercase()),
        Host::Domain(_) => None,
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

/// Decode the raw `url` parameter and apply the OpenAPI shortcut and admin alias
pub fn resolve_target(raw: &str, config: &PublicConfig) -> Result<FetchTarget> {
    let decoded = urlencoding::decode_binary(raw.trim().as_bytes());
    let mut decoded = String::from_utf8_lossy(&decoded).into_owned();
    if decoded == OPENAPI_SHORTCUT {
        decoded = config.spec_url.clone();
    }

    let mut url = Url::parse(&decoded)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(unsupported());
    }
    let mut hostname = host_name(&url).ok_or_else(unsupported)?;
    let port = url.port_or_known_default().unwrap_or(80);

    if (hostname == "localhost" || hostname == "127.0.0.1") && port == config.admin_alias_port {
        let (alias_host, alias_port) = match config.admin_upstream.rsplit_once(':') {
            Some((h, p)) => (h, p.parse::<u16>().ok()),
            None => (config.admin_upstream.as_str(), None),
        };
        let _ = url.set_username("");
        let _ = url.set_password(None);
        url.set_host(Some(alias_host)).map_err(|_| GalleryError::Config {
            message: format!("invalid admin upstream '{}'", config.admin_upstream),
        })?;
        let _ = url.set_port(alias_port);
        hostname = host_name(&url).ok_or_else(unsupported)?;
        tracing::debug!("aliased admin target to {}", url);
    }

    Ok(FetchTarget {
        url,
        hostname,
        port,
    })
}

/// Run the filter for a target without fetching it
pub async fn check_target(
    target: &FetchTarget,
    policy: &SsrfPolicy,
    resolver: &dyn HostResolver,
) -> FilterVerdict {
    policy.evaluate(&target.hostname, resolver).await
}

fn cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

/// Header-safe value; falls back to the percent-encoded form
fn header_value(s: &str) -> HeaderValue {
    HeaderValue::from_str(s)
        .or_else(|_| HeaderValue::from_str(&urlencoding::encode(s)))
        .unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub async fn fetch_preflight() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    cors_headers(&mut headers);
    (StatusCode::NO_CONTENT, headers)
}

pub async fn fetch_handler(
    State(state): State<PublicState>,
    Query(params): Query<FetchParams>,
) -> Result<Response> {
    let raw_url = match params.url {
        Some(u) if !u.is_empty() => u,
        _ => return Err(GalleryError::bad_request("Missing 'url' parameter")),
    };

    let target = resolve_target(&raw_url, &state.config)?;
    let verdict = check_target(&target, &state.policy, state.resolver.as_ref()).await;
    if !verdict.allowed {
        return Err(GalleryError::Blocked {
            message: "external hosts not allowed".to_string(),
        });
    }

    tracing::info!("proxying {} (port {})", target.url, target.port);
    let upstream = state
        .client
        .get(target.url.clone())
        .header(header::USER_AGENT, state.config.user_agent.as_str())
        .send()
        .await?;

    let status = upstream.status();
    let final_url = upstream.url().to_string();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let mut content = upstream.bytes().await?.to_vec();

    if is_html(&content_type) {
        content = rewrite_html(&content, &target.url, &state.rewrite).into_bytes();
    }

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value(&content_type));
    headers.insert(
        HeaderName::from_static("x-proxy-status"),
        HeaderValue::from_static("proxied"),
    );
    headers.insert(
        HeaderName::from_static("x-proxy-original-url"),
        header_value(&raw_url),
    );
    headers.insert(
        HeaderName::from_static("x-proxy-final-url"),
        header_value(&final_url),
    );
    cors_headers(&mut headers);

    Ok((status, headers, Body::from(content)).into_response())
}
