#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use ctf_gallery::ssrf::HostResolver;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use tower::ServiceExt;

/// Resolver answering from a fixed table; unknown names do not resolve
#[derive(Default)]
pub struct StaticResolver(pub HashMap<String, Vec<IpAddr>>);

impl StaticResolver {
    pub fn with(mut self, host: &str, ips: &[&str]) -> Self {
        self.0.insert(
            host.to_string(),
            ips.iter().map(|ip| ip.parse().unwrap()).collect(),
        );
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, hostname: &str) -> Vec<IpAddr> {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return vec![ip];
        }
        self.0.get(hostname).cloned().unwrap_or_default()
    }
}

pub async fn send(app: Router, req: Request<Body>) -> Response {
    app.oneshot(req).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_string(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
