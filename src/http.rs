//! Listener plumbing shared by both services

use axum::Router;
use std::net::SocketAddr;

use crate::error::Result;

/// Bind and serve `app` until ctrl-c, exposing peer addresses to handlers
pub async fn serve(app: Router, bind: SocketAddr, name: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {} listener on {}: {}", name, bind, e))?;

    tracing::info!("Starting {} on {}", name, bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| anyhow::anyhow!("{} server error: {}", name, e))?;

    tracing::info!("{} stopped", name);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
