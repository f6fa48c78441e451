//! Ingress types

use marketgate_core::{ResolutionSource, TenantConfig};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Tenant resolved for the current request, stored in request extensions
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub tenant: Arc<TenantConfig>,
    pub source: ResolutionSource,
}

/// Body of `GET /resolve`
#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
    pub path: Option<String>,
    pub source: &'static str,
    pub tenant: TenantConfig,
}

/// Ingress errors
#[derive(Debug, Error)]
pub enum IngressError {
    /// No tenant for the requested market or path
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// Route does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl axum::response::IntoResponse for IngressError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, error_type, message) = match self {
            IngressError::TenantNotFound(msg) => (StatusCode::NOT_FOUND, "tenant_not_found", msg),
            IngressError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
        };

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Ingress result type
pub type IngressResult<T> = Result<T, IngressError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            IngressError::TenantNotFound("de".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            IngressError::NotFound("/nope".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }
}
