//! Health endpoints
//!
//! - `/healthz` - liveness, 200 whenever the process is serving
//! - `/readyz` - readiness, 503 until the readiness checker is satisfied
//! - `/metrics` - Prometheus text exposition

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::metrics::Metrics;

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// `ready` or `not_ready`
    pub status: &'static str,
    /// Registered tenants, when a checker is installed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenants: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Decides whether the service may receive traffic
pub trait ReadinessChecker: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Number of tenants currently registered
    fn tenant_count(&self) -> usize;

    /// Explanation shown when not ready
    fn not_ready_reason(&self) -> String {
        "Service is not ready".to_string()
    }
}

/// Shared state of the health router
#[derive(Clone)]
pub struct HealthState {
    pub metrics: Arc<Metrics>,
    /// Without a checker the service always reports ready
    pub readiness: Option<Arc<dyn ReadinessChecker>>,
}

impl HealthState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            readiness: None,
        }
    }

    pub fn with_readiness(mut self, checker: Arc<dyn ReadinessChecker>) -> Self {
        self.readiness = Some(checker);
        self
    }

    fn readiness_report(&self) -> (StatusCode, ReadinessResponse) {
        let Some(checker) = &self.readiness else {
            return (
                StatusCode::OK,
                ReadinessResponse {
                    status: "ready",
                    tenants: None,
                    message: None,
                },
            );
        };

        let tenants = Some(checker.tenant_count());
        if checker.is_ready() {
            (
                StatusCode::OK,
                ReadinessResponse {
                    status: "ready",
                    tenants,
                    message: None,
                },
            )
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ReadinessResponse {
                    status: "not_ready",
                    tenants,
                    message: Some(checker.not_ready_reason()),
                },
            )
        }
    }
}

/// Create the `/healthz`, `/readyz` and `/metrics` router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn readyz(State(state): State<HealthState>) -> Response {
    let (status, body) = state.readiness_report();
    (status, Json(body)).into_response()
}

async fn metrics_handler(State(state): State<HealthState>) -> Response {
    // The gauge is refreshed on scrape so it also covers registry changes
    // made outside the provisioning path
    if let Some(checker) = &state.readiness {
        state.metrics.set_registered_tenants(checker.tenant_count());
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.metrics.registry().gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt; // for oneshot

    struct FixedReadiness(usize);

    impl ReadinessChecker for FixedReadiness {
        fn is_ready(&self) -> bool {
            self.0 > 0
        }

        fn tenant_count(&self) -> usize {
            self.0
        }

        fn not_ready_reason(&self) -> String {
            "Default tenant 'us' is not registered".to_string()
        }
    }

    fn state(tenants: Option<usize>) -> HealthState {
        let state = HealthState::new(Arc::new(Metrics::new().unwrap()));
        match tenants {
            Some(count) => state.with_readiness(Arc::new(FixedReadiness(count))),
            None => state,
        }
    }

    async fn get(state: HealthState, uri: &str) -> (StatusCode, String) {
        let response = health_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_healthz_reports_version() {
        let (status, body) = get(state(Some(0)), "/healthz").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_readyz() {
        let (status, body) = get(state(Some(3)), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["tenants"], 3);

        let (status, body) = get(state(Some(0)), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "not_ready");
        assert_eq!(json["message"], "Default tenant 'us' is not registered");
    }

    #[tokio::test]
    async fn test_readyz_without_checker() {
        let (status, body) = get(state(None), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("tenants"));
    }

    #[tokio::test]
    async fn test_metrics_scrape_refreshes_tenant_gauge() {
        let state = state(Some(3));
        state
            .metrics
            .record_origin_decision("denied", "missing_origin");

        let (status, body) = get(state, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("marketgate_registered_tenants 3"));
        assert!(body.contains("marketgate_origin_decisions_total"));
    }
}
