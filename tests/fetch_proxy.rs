mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::{Html, Redirect},
    routing::get,
};
use common::{StaticResolver, body_string, send, spawn};
use ctf_gallery::config::PublicConfig;
use ctf_gallery::public::{PublicState, router};
use ctf_gallery::templating::urlencode;
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::sync::Arc;

const SWAGGER_HTML: &str = r#"<html><head><link href="swagger/ui.css"></head><body><script>var cfg = {oauth: None};</script></body></html>"#;

async fn upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/plain",
            get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "hello from upstream") }),
        )
        .route("/page", get(|| async { Html(SWAGGER_HTML) }))
        .route("/hop", get(|| async { Redirect::temporary("/plain") }))
        .route(
            "/teapot",
            get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }),
        )
        // Bare body: no content-type header reaches the proxy
        .route("/binary", get(|| async { Body::from(vec![0u8, 159, 146, 150]) }));
    spawn(app).await
}

fn proxy_app(config: PublicConfig) -> Router {
    let resolver = StaticResolver::default().with("evil.example", &["93.184.216.34"]);
    router(PublicState::with_resolver(config, Arc::new(resolver)).unwrap())
}

fn test_config() -> PublicConfig {
    PublicConfig {
        request_timeout_secs: 3,
        thumbs_dir: std::env::temp_dir(),
        ..PublicConfig::default()
    }
}

fn fetch_uri(target: &str) -> String {
    format!("/fetch?url={}", urlencode(target))
}

async fn fetch(target: &str) -> axum::response::Response {
    common::get(proxy_app(test_config()), &fetch_uri(target)).await
}

#[tokio::test]
async fn missing_url_is_a_bad_request() {
    let resp = common::get(proxy_app(test_config()), "/fetch").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(resp).await, "Missing 'url' parameter");

    let resp = common::get(proxy_app(test_config()), "/fetch?url=").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_scheme_is_a_bad_request() {
    let resp = fetch("file:///etc/passwd").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_string(resp).await,
        "Unsupported URL scheme or missing hostname"
    );
}

#[tokio::test]
async fn preflight_returns_cors_headers() {
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/fetch")
        .body(Body::empty())
        .unwrap();
    let resp = send(proxy_app(test_config()), req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let h = resp.headers();
    assert_eq!(h["access-control-allow-origin"], "*");
    assert_eq!(h["access-control-allow-methods"], "GET, OPTIONS");
    assert_eq!(h["access-control-allow-headers"], "Content-Type");
}

#[tokio::test]
async fn external_hosts_are_blocked() {
    for target in [
        "http://evil.example/",
        "http://93.184.216.34/",
        "http://unknown.invalid/",
    ] {
        let resp = fetch(target).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{target}");
        assert_eq!(
            body_string(resp).await,
            "Blocked by SSRF filter: external hosts not allowed"
        );
    }
}

#[tokio::test]
async fn internal_targets_are_proxied_verbatim() {
    let addr = upstream().await;
    let target = format!("http://127.0.0.1:{}/plain", addr.port());
    let resp = fetch(&target).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let h = resp.headers().clone();
    assert_eq!(h["x-proxy-status"], "proxied");
    assert_eq!(h["x-proxy-original-url"], target.as_str());
    assert_eq!(h["x-proxy-final-url"], target.as_str());
    assert_eq!(h["access-control-allow-origin"], "*");
    assert_eq!(h[header::CONTENT_TYPE], "text/plain");
    assert_eq!(body_string(resp).await, "hello from upstream");
}

#[tokio::test]
async fn double_encoded_urls_are_accepted() {
    let addr = upstream().await;
    let target = format!("http://127.0.0.1:{}/plain", addr.port());
    let uri = format!("/fetch?url={}", urlencode(&urlencode(&target)));
    let resp = common::get(proxy_app(test_config()), &uri).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-proxy-original-url"], urlencode(&target).as_str());
}

#[tokio::test]
async fn redirects_are_followed_and_reported() {
    let addr = upstream().await;
    let resp = fetch(&format!("http://127.0.0.1:{}/hop", addr.port())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["x-proxy-final-url"],
        format!("http://127.0.0.1:{}/plain", addr.port()).as_str()
    );
}

#[tokio::test]
async fn upstream_status_passes_through() {
    let addr = upstream().await;
    let resp = fetch(&format!("http://127.0.0.1:{}/teapot", addr.port())).await;
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_string(resp).await, "short and stout");
}

#[tokio::test]
async fn binary_bodies_are_untouched() {
    let addr = upstream().await;
    let resp = fetch(&format!("http://127.0.0.1:{}/binary", addr.port())).await;
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], &[0u8, 159, 146, 150]);
}

#[tokio::test]
async fn html_is_rewritten_for_the_proxy() {
    let addr = upstream().await;
    let target = format!("http://127.0.0.1:{}/page", addr.port());
    let resp = fetch(&target).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_string(resp).await;

    let base = format!(r#"<head><base href="/fetch?url={}" />"#, urlencode(&target));
    assert!(html.contains(&base), "{html}");
    assert_eq!(html.matches("<base ").count(), 1);
    assert!(html.contains(
        r#"href="/fetch?url=http%3A%2F%2Flocalhost%3A9000%2Fopenapi%2Fswagger%2Fui.css""#
    ));
    assert!(html.contains("var cfg = {oauth: null};"));
    assert!(html.contains("FIXED_SPEC_URL = \"http://localhost:9000/openapi/openapi.json\""));
}

#[tokio::test]
async fn transport_failures_are_bad_gateway() {
    // Loopback passes the filter; nothing listens on port 1
    let mut config = test_config();
    config.request_timeout_secs = 1;
    let resp = common::get(
        proxy_app(config),
        &fetch_uri("http://127.0.0.1:1/unreachable"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(
        body_string(resp)
            .await
            .starts_with("Error fetching target: ")
    );
}
