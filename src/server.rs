use crate::config::HEALTH_PATH;
use crate::constants::SERVICE_NAME;
use crate::error::{ExporterError, Result};
use crate::showq::ShowqCollector;
use axum::{
    http::header,
    response::{IntoResponse, Json},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::info;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Render every registered series in the Prometheus text format, followed
/// by a fresh queue snapshot when showq is enabled
async fn metrics(
    Extension(handle): Extension<PrometheusHandle>,
    Extension(showq): Extension<Option<ShowqCollector>>,
) -> impl IntoResponse {
    let mut body = handle.render();
    if let Some(showq) = showq {
        body.push_str(&showq.render().await);
    }
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

/// Create the scrape router. `metrics_path` must start with `/` and differ
/// from the health route; config validation guarantees both.
pub fn create_router(
    handle: PrometheusHandle,
    showq: Option<ShowqCollector>,
    metrics_path: &str,
) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(metrics_path, get(metrics))
        .layer(Extension(handle))
        .layer(Extension(showq))
}

/// Serve `router` on `addr` until `shutdown` flips to true.
pub async fn start_server(
    addr: SocketAddr,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let server = Server::try_bind(&addr)
        .map_err(|e| ExporterError::Server(format!("cannot bind {}: {}", addr, e)))?;

    info!("HTTP server listening on http://{}", addr);

    server
        .serve(router.into_make_service())
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| ExporterError::Server(e.to_string()))?;

    info!("HTTP server stopped");
    Ok(())
}
