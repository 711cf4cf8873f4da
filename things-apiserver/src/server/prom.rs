//! Prometheus scrape endpoint.

use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::Extension;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{AddExtensionLayer, Router};
use futures::prelude::*;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// The content type of the Prometheus text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Spawn the metrics server, which renders the given recorder handle on `/metrics`.
pub fn spawn_prom_server(port: u16, handle: PrometheusHandle, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<Result<()>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server = axum::Server::bind(&addr)
        .serve(metrics_router(handle).into_make_service())
        .with_graceful_shutdown(async move {
            let _res = shutdown.recv().await;
        });
    tracing::info!("metrics server is listening at {}/metrics", addr);
    tokio::spawn(server.map_err(anyhow::Error::from))
}

/// Build the router of the metrics server.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .layer(AddExtensionLayer::new(handle))
}

async fn scrape(Extension(handle): Extension<PrometheusHandle>) -> (StatusCode, HeaderMap, String) {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EXPOSITION_CONTENT_TYPE));
    (StatusCode::OK, headers, handle.render())
}
