//! Tenant-aware ingress middleware

use crate::types::ResolvedTenant;
use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use marketgate_core::{OriginGate, TenantConfig, TenantRegistry};
use marketgate_observability::Metrics;
use std::sync::Arc;
use tracing::debug;

const X_QSR_MARKET: HeaderName = HeaderName::from_static("x-qsr-market");
const X_QSR_LOCALE: HeaderName = HeaderName::from_static("x-qsr-locale");
const X_QSR_CURRENCY: HeaderName = HeaderName::from_static("x-qsr-currency");
const X_QSR_TIMEZONE: HeaderName = HeaderName::from_static("x-qsr-timezone");
const X_QSR_EDS_HOST: HeaderName = HeaderName::from_static("x-qsr-eds-host");
const X_QSR_CONTENT_ROOT: HeaderName = HeaderName::from_static("x-qsr-content-root");

/// Shared state for the tenant middleware and routes
#[derive(Clone)]
pub struct IngressState {
    pub registry: Arc<TenantRegistry>,
    pub gate: Arc<OriginGate>,
    pub metrics: Option<Arc<Metrics>>,
}

impl IngressState {
    /// State whose origin gate checks against `registry`
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        let gate = Arc::new(OriginGate::new(registry.clone()));
        Self {
            registry,
            gate,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the origin gate (e.g. pattern-only bootstrap mode)
    pub fn with_gate(mut self, gate: OriginGate) -> Self {
        self.gate = Arc::new(gate);
        self
    }
}

/// Apply both tenant middleware layers to every route (and fallback) of `router`
///
/// CORS is the outer layer so an allowed preflight is answered before any
/// tenant resolution happens.
pub fn with_tenant_layers(router: Router, state: IngressState) -> Router {
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_context_middleware,
        ))
        .layer(middleware::from_fn_with_state(state, eds_cors_middleware))
}

/// CORS middleware for edge-delivery origins
///
/// Denied requests are passed through without any CORS headers, leaving
/// enforcement to the browser. An allowed `OPTIONS` preflight is answered
/// here with an empty 200.
pub async fn eds_cors_middleware(
    State(state): State<IngressState>,
    req: Request,
    next: Next,
) -> Response {
    // A non-ASCII Origin can never match the edge pattern; treat it as absent
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    let decision = state.gate.decide(origin, req.method());

    if let Some(metrics) = &state.metrics {
        metrics.record_origin_decision(decision.verdict.outcome(), decision.verdict.reason());
    }

    if decision.short_circuit {
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(response.headers_mut(), decision.headers);
        return response;
    }

    let mut response = next.run(req).await;
    if decision.is_allowed() {
        apply_cors_headers(response.headers_mut(), decision.headers);
    }
    response
}

fn apply_cors_headers(headers: &mut HeaderMap, cors: Vec<(HeaderName, HeaderValue)>) {
    for (name, value) in cors {
        headers.insert(name, value);
    }
}

/// Resolve the tenant from the request path
///
/// The resolved tenant is inserted as a [`ResolvedTenant`] extension for
/// handlers, and its metadata is copied onto the response as `x-qsr-*`
/// headers.
pub async fn tenant_context_middleware(
    State(state): State<IngressState>,
    mut req: Request,
    next: Next,
) -> Response {
    let resolution = state.registry.resolve_detailed(req.uri().path());

    if let Some(metrics) = &state.metrics {
        metrics.record_resolution(resolution.source.as_str());
    }

    let Some(tenant) = resolution.tenant else {
        debug!(path = req.uri().path(), "No tenant resolved for request");
        return next.run(req).await;
    };

    req.extensions_mut().insert(ResolvedTenant {
        tenant: tenant.clone(),
        source: resolution.source,
    });

    let mut response = next.run(req).await;
    tag_response(response.headers_mut(), &tenant);
    response
}

fn tag_response(headers: &mut HeaderMap, tenant: &TenantConfig) {
    let fields = [
        (X_QSR_MARKET, tenant.market()),
        (X_QSR_LOCALE, tenant.locale()),
        (X_QSR_CURRENCY, tenant.currency()),
        (X_QSR_TIMEZONE, tenant.timezone()),
        (X_QSR_EDS_HOST, tenant.eds_host()),
        (X_QSR_CONTENT_ROOT, tenant.content_root()),
    ];

    for (name, value) in fields {
        if value.is_empty() {
            continue;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => debug!(header = %name, "Skipping tenant value not valid as a header"),
        }
    }
}
