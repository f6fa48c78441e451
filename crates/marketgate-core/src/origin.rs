//! Edge-delivery origin gate
//!
//! Decides whether a browser `Origin` may read responses cross-origin. The
//! generic edge-delivery domain pattern is always required. On top of that,
//! when tenants are registered the origin's host must belong to one of them.
//! With no registry attached (or an empty one) the pattern alone decides,
//! which is the single-tenant bootstrap mode.
//!
//! Every failure path ends in a typed [`OriginVerdict::Denied`]; nothing in
//! here can grant access by accident.

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, HeaderName, HeaderValue,
};
use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::registry::TenantRegistry;

static EDS_ORIGIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://[a-zA-Z0-9-]+\.(hlx\.page|hlx\.live|aem\.page|aem\.live)$").unwrap()
});

const ORIGIN_SCHEME: &str = "https://";

/// Methods advertised to allowed origins
pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Request headers advertised to allowed origins
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Requested-With";

/// Why an origin was allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedBy {
    /// The origin host matched a registered tenant
    Tenant,
    /// No tenants are known; the generic pattern was sufficient
    Bootstrap,
}

/// Why an origin was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No `Origin` header
    MissingOrigin,
    /// Not an https edge-delivery origin
    PatternMismatch,
    /// The origin could not be reduced to a hostname or header value
    MalformedOrigin,
    /// The host does not belong to any registered tenant
    UnknownTenantHost,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingOrigin => "missing_origin",
            DenyReason::PatternMismatch => "pattern_mismatch",
            DenyReason::MalformedOrigin => "malformed_origin",
            DenyReason::UnknownTenantHost => "unknown_tenant_host",
        }
    }
}

/// Result of evaluating an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginVerdict {
    Allowed(AllowedBy),
    Denied(DenyReason),
}

impl OriginVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, OriginVerdict::Allowed(_))
    }

    /// `allowed` or `denied`
    pub fn outcome(&self) -> &'static str {
        match self {
            OriginVerdict::Allowed(_) => "allowed",
            OriginVerdict::Denied(_) => "denied",
        }
    }

    /// Reason label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            OriginVerdict::Allowed(AllowedBy::Tenant) => "tenant",
            OriginVerdict::Allowed(AllowedBy::Bootstrap) => "bootstrap",
            OriginVerdict::Denied(reason) => reason.as_str(),
        }
    }
}

/// What the HTTP adapter should do with a request
#[derive(Debug, Clone)]
pub struct CorsDecision {
    pub verdict: OriginVerdict,
    /// Response headers to set; empty when denied
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Answer immediately with an empty success response (allowed preflight)
    pub short_circuit: bool,
}

impl CorsDecision {
    fn denied(reason: DenyReason) -> Self {
        Self {
            verdict: OriginVerdict::Denied(reason),
            headers: Vec::new(),
            short_circuit: false,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.verdict.is_allowed()
    }
}

/// Origin policy backed by an optional tenant registry
#[derive(Debug, Clone, Default)]
pub struct OriginGate {
    registry: Option<Arc<TenantRegistry>>,
}

impl OriginGate {
    /// Create a gate that checks origins against `registry`
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// Create a gate with no tenant-aware policy (generic pattern only)
    pub fn without_registry() -> Self {
        Self { registry: None }
    }

    pub fn registry(&self) -> Option<&Arc<TenantRegistry>> {
        self.registry.as_ref()
    }

    /// Evaluate an `Origin` header value
    pub fn evaluate(&self, origin: Option<&str>) -> OriginVerdict {
        let verdict = self.check(origin);
        match verdict {
            OriginVerdict::Allowed(_) => {
                trace!(origin, reason = verdict.reason(), "Origin allowed")
            }
            OriginVerdict::Denied(_) => debug!(origin, reason = verdict.reason(), "Origin denied"),
        }
        verdict
    }

    /// Evaluate an origin and build the response contract for `method`.
    ///
    /// An allowed origin is echoed back verbatim (never `*`) along with the
    /// advertised methods, headers and credentials flag. An allowed `OPTIONS`
    /// request is a preflight and short-circuits.
    pub fn decide(&self, origin: Option<&str>, method: &Method) -> CorsDecision {
        let verdict = self.evaluate(origin);
        if let OriginVerdict::Denied(reason) = verdict {
            return CorsDecision::denied(reason);
        }

        let Some(allow_origin) = origin.and_then(|o| HeaderValue::from_str(o).ok()) else {
            return CorsDecision::denied(DenyReason::MalformedOrigin);
        };

        CorsDecision {
            verdict,
            headers: vec![
                (ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin),
                (
                    ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static(ALLOWED_METHODS),
                ),
                (
                    ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static(ALLOWED_HEADERS),
                ),
                (
                    ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                ),
            ],
            short_circuit: method == Method::OPTIONS,
        }
    }

    fn check(&self, origin: Option<&str>) -> OriginVerdict {
        let Some(origin) = origin else {
            return OriginVerdict::Denied(DenyReason::MissingOrigin);
        };

        if !EDS_ORIGIN_PATTERN.is_match(origin) {
            return OriginVerdict::Denied(DenyReason::PatternMismatch);
        }

        let registry = match &self.registry {
            Some(registry) if !registry.is_empty() => registry,
            _ => return OriginVerdict::Allowed(AllowedBy::Bootstrap),
        };

        let hostname = match origin.strip_prefix(ORIGIN_SCHEME) {
            Some(hostname) if !hostname.is_empty() => hostname,
            _ => return OriginVerdict::Denied(DenyReason::MalformedOrigin),
        };

        match registry.find_eds_origin(hostname) {
            Some(tenant) => {
                trace!(market = tenant.market(), hostname, "Origin matched tenant");
                OriginVerdict::Allowed(AllowedBy::Tenant)
            }
            None => OriginVerdict::Denied(DenyReason::UnknownTenantHost),
        }
    }
}
