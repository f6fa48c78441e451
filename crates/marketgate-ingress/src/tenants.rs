//! Tenant introspection routes
//!
//! - `GET /tenants` - every registered tenant, sorted by market
//! - `GET /tenants/{market}` - one tenant
//! - `GET /resolve?path=...` - which tenant a content path resolves to

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use marketgate_core::TenantConfig;
use serde::Deserialize;

use crate::middleware::IngressState;
use crate::types::{IngressError, IngressResult, ResolveResponse};

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub path: Option<String>,
}

/// Create the tenant introspection router
pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/tenants", get(list_tenants))
        .route("/tenants/{market}", get(get_tenant))
        .route("/resolve", get(resolve))
        .with_state(state)
}

async fn list_tenants(State(state): State<IngressState>) -> Json<Vec<TenantConfig>> {
    let mut tenants: Vec<TenantConfig> = state
        .registry
        .all_tenants()
        .iter()
        .map(|t| TenantConfig::clone(t))
        .collect();
    tenants.sort_by(|a, b| a.market().cmp(b.market()));
    Json(tenants)
}

async fn get_tenant(
    State(state): State<IngressState>,
    Path(market): Path<String>,
) -> IngressResult<Json<TenantConfig>> {
    state
        .registry
        .get_tenant(&market)
        .map(|t| Json(TenantConfig::clone(&t)))
        .ok_or_else(|| IngressError::TenantNotFound(format!("no tenant for market '{}'", market)))
}

async fn resolve(
    State(state): State<IngressState>,
    Query(query): Query<ResolveQuery>,
) -> IngressResult<Json<ResolveResponse>> {
    let resolution = state.registry.resolve_detailed(query.path.as_deref());

    if let Some(metrics) = &state.metrics {
        metrics.record_resolution(resolution.source.as_str());
    }

    match resolution.tenant {
        Some(tenant) => Ok(Json(ResolveResponse {
            source: resolution.source.as_str(),
            tenant: TenantConfig::clone(&tenant),
            path: query.path,
        })),
        None => Err(IngressError::TenantNotFound(
            "no tenant could be resolved and no default is registered".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use marketgate_core::TenantRegistry;
    use std::sync::Arc;
    use tower::ServiceExt; // for oneshot

    fn state() -> IngressState {
        let registry = Arc::new(TenantRegistry::new());
        for (market, locale) in [("us", "en-US"), ("jp", "ja-JP"), ("uk", "en-GB")] {
            registry.register(
                TenantConfig::new(market, locale, format!("/content/qsr/{}", market))
                    .unwrap()
                    .with_eds_host(format!("main--qsr-{}--org.aem.live", market)),
            );
        }
        IngressState::new(registry)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_list_tenants_sorted() {
        let (status, json) = get_json(router(state()), "/tenants").await;
        assert_eq!(status, StatusCode::OK);

        let markets: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["market"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(markets, vec!["jp", "uk", "us"]);
        assert_eq!(json[0]["edsHost"], "main--qsr-jp--org.aem.live");
        assert_eq!(json[0]["contentRoot"], "/content/qsr/jp");
    }

    #[tokio::test]
    async fn test_get_tenant() {
        let (status, json) = get_json(router(state()), "/tenants/uk").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["locale"], "en-GB");
    }

    #[tokio::test]
    async fn test_get_unknown_tenant() {
        let (status, json) = get_json(router(state()), "/tenants/de").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["type"], "tenant_not_found");
        assert_eq!(json["error"]["code"], 404);
    }

    #[tokio::test]
    async fn test_resolve_by_path() {
        let (status, json) =
            get_json(router(state()), "/resolve?path=/content/qsr/jp/menu").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["source"], "path");
        assert_eq!(json["tenant"]["market"], "jp");
    }

    #[tokio::test]
    async fn test_resolve_without_path_uses_default() {
        let (status, json) = get_json(router(state()), "/resolve").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["source"], "default");
        assert_eq!(json["tenant"]["market"], "us");
    }

    #[tokio::test]
    async fn test_resolve_unresolved() {
        let app = router(IngressState::new(Arc::new(TenantRegistry::new())));
        let (status, json) = get_json(app, "/resolve?path=/content/qsr/jp").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["type"], "tenant_not_found");
    }
}
