// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP endpoints for Prometheus scraping and the liveness probe.
//!
//! - `/metrics` - text exposition of [`crate::metrics::METRICS_REGISTRY`]
//! - `/healthz` - always 200 while the process serves requests

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::metrics::gather_metrics;

/// Router with every operator endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
}

/// Serve [`router`] on `addr` until the process exits.
///
/// # Errors
///
/// Returns an error when the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "metrics server listening");
    axum::serve(listener, router()).await?;
    Ok(())
}

pub(crate) async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}"),
            )
        }
    }
}

pub(crate) async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
