// Liveness endpoint for the hosting platform

use axum::{http::StatusCode, routing::get, Router};

/// Body of `GET /`
pub const RUNNING: &str = "running";

async fn root_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, RUNNING)
}

pub fn create_health_router() -> Router {
    Router::new().route("/", get(root_handler))
}

/// Serve the health router until the process exits
pub async fn start_health_server(port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Health check server listening on {}", addr);
    axum::serve(listener, create_health_router()).await?;
    Ok(())
}
