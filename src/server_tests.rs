// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `server.rs`

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use crate::metrics::record_resource_action;
    use crate::server::{healthz_handler, metrics_handler};

    #[tokio::test]
    async fn test_healthz_is_ok() {
        let response = healthz_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_are_text_exposition() {
        record_resource_action("ServerTestKind", "created");

        let response = metrics_handler().await.into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }
}
