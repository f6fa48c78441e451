//! Integration tests for observability
//!
//! These tests verify that metrics and health checks work correctly when
//! readiness changes while the service runs.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use marketgate_observability::{HealthState, Metrics, ReadinessChecker, health_router};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

// Readiness checker backed by a tenant counter that tests can change
struct CountingReadinessChecker {
    tenants: AtomicUsize,
}

impl ReadinessChecker for CountingReadinessChecker {
    fn is_ready(&self) -> bool {
        self.tenants.load(Ordering::SeqCst) > 0
    }

    fn tenant_count(&self) -> usize {
        self.tenants.load(Ordering::SeqCst)
    }
}

async fn status_of(state: HealthState, uri: &str) -> StatusCode {
    health_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_readiness_follows_provisioning() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let checker = Arc::new(CountingReadinessChecker {
        tenants: AtomicUsize::new(0),
    });
    let state = HealthState::new(metrics).with_readiness(checker.clone());

    assert_eq!(
        status_of(state.clone(), "/readyz").await,
        StatusCode::SERVICE_UNAVAILABLE
    );

    checker.tenants.store(2, Ordering::SeqCst);
    assert_eq!(status_of(state.clone(), "/readyz").await, StatusCode::OK);

    // Liveness never depends on readiness
    checker.tenants.store(0, Ordering::SeqCst);
    assert_eq!(status_of(state, "/healthz").await, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_recording_workflow() {
    let metrics = Arc::new(Metrics::new().unwrap());

    metrics.record_origin_decision("allowed", "tenant");
    metrics.record_origin_decision("allowed", "bootstrap");
    metrics.record_origin_decision("denied", "unknown_tenant_host");
    metrics.record_resolution("path");
    metrics.record_resolution("default");
    metrics.record_tenant_sync(true);
    metrics.set_registered_tenants(3);

    let families = metrics.registry().gather();
    let names: Vec<&str> = families.iter().map(|f| f.name()).collect();
    for expected in [
        "marketgate_origin_decisions_total",
        "marketgate_tenant_resolutions_total",
        "marketgate_registered_tenants",
        "marketgate_tenant_syncs_total",
    ] {
        assert!(names.contains(&expected), "missing {expected}");
    }

    assert_eq!(
        status_of(HealthState::new(metrics), "/metrics").await,
        StatusCode::OK
    );
}
