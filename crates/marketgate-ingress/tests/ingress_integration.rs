//! End-to-end tests for the tenant routes behind both middleware layers

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use marketgate_core::{TenantConfig, TenantRegistry};
use marketgate_ingress::{IngressState, tenants, with_tenant_layers};
use marketgate_observability::Metrics;
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

fn tenant(market: &str, locale: &str) -> TenantConfig {
    TenantConfig::new(market, locale, format!("/content/qsr/{}", market))
        .unwrap()
        .with_eds_host(format!("main--qsr-{}--org.aem.live", market))
}

fn app(state: IngressState) -> Router {
    with_tenant_layers(tenants::router(state.clone()), state)
}

async fn send(app: Router, method: Method, uri: &str, origin: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn allow_origin(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map(|v| v.to_str().unwrap().to_string())
}

#[tokio::test]
async fn test_bootstrap_then_tenant_policy() {
    let registry = Arc::new(TenantRegistry::new());
    let state = IngressState::new(registry.clone());
    let any_site = "https://main--brand-new-site--org.aem.page";

    // Empty registry: the edge pattern alone decides
    let response = send(app(state.clone()), Method::GET, "/tenants", Some(any_site)).await;
    assert_eq!(allow_origin(&response).as_deref(), Some(any_site));

    // Once tenants exist, only their hosts are allowed
    registry.register(tenant("us", "en-US"));
    let response = send(app(state.clone()), Method::GET, "/tenants", Some(any_site)).await;
    assert_eq!(allow_origin(&response), None);

    let us = "https://main--qsr-us--org.hlx.live";
    let response = send(app(state), Method::GET, "/tenants", Some(us)).await;
    assert_eq!(allow_origin(&response).as_deref(), Some(us));
}

#[tokio::test]
async fn test_routes_are_tagged_with_tenant() {
    let registry = Arc::new(TenantRegistry::new());
    registry.register(tenant("us", "en-US"));
    registry.register(tenant("jp", "ja-JP"));
    let state = IngressState::new(registry);

    // Non-content paths fall back to the default market
    let response = send(app(state), Method::GET, "/tenants/jp", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-qsr-market").unwrap(), "us");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["market"], "jp");
    assert_eq!(json["locale"], "ja-JP");
}

#[tokio::test]
async fn test_preflight_on_tenant_route() {
    let registry = Arc::new(TenantRegistry::new());
    registry.register(tenant("us", "en-US"));
    let state = IngressState::new(registry);

    let origin = "https://main--qsr-us--org.aem.live";
    let response = send(app(state), Method::OPTIONS, "/resolve", Some(origin)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(allow_origin(&response).as_deref(), Some(origin));
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .unwrap(),
        "Content-Type, Authorization, X-Requested-With"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_metrics_across_requests() {
    let registry = Arc::new(TenantRegistry::new());
    registry.register(tenant("us", "en-US"));
    registry.register(tenant("uk", "en-GB"));
    let metrics = Arc::new(Metrics::new().unwrap());
    let state = IngressState::new(registry).with_metrics(metrics.clone());

    send(app(state.clone()), Method::GET, "/tenants", None).await;
    send(
        app(state.clone()),
        Method::GET,
        "/tenants",
        Some("https://evil.example.com"),
    )
    .await;
    send(
        app(state),
        Method::GET,
        "/resolve?path=/content/qsr/uk/home",
        Some("https://main--qsr-uk--org.aem.live"),
    )
    .await;

    let decisions = &metrics.origin_decisions_total;
    assert_eq!(
        decisions
            .with_label_values(&["denied", "missing_origin"])
            .get(),
        1.0
    );
    assert_eq!(
        decisions
            .with_label_values(&["denied", "pattern_mismatch"])
            .get(),
        1.0
    );
    assert_eq!(decisions.with_label_values(&["allowed", "tenant"]).get(), 1.0);

    // /resolve is counted once by the middleware (default) and once by the handler (path)
    let resolutions = &metrics.tenant_resolutions_total;
    assert_eq!(resolutions.with_label_values(&["default"]).get(), 3.0);
    assert_eq!(resolutions.with_label_values(&["path"]).get(), 1.0);
}
