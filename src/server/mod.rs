//! HTTP surface
//!
//! - `GET /?url=...[&subpages=true][&nocache=true][&llmFilter=true]`
//! - `GET /health`
//!
//! The response shape follows the request `Content-Type`: `application/json`
//! returns an array of results, anything else returns markdown.

mod handlers;
mod help;
mod routes;

pub use handlers::{ConvertParams, caller_identity};
pub use help::HELP_PAGE;
pub use routes::create_router;

use anyhow::Context;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::lifecycle::IdleController;
use crate::orchestrator::Converter;

/// Shared state for the handlers
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<Converter>,
    pub lifecycle: Arc<IdleController>,
    pub api_secret: Option<String>,
    pub max_links: usize,
}

/// Bind `host:port` and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("HTTP server failed")?;

    Ok(())
}
