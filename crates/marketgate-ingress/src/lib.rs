//! MarketGate Ingress Adapters
//!
//! This crate is the HTTP side of the tenant engine:
//! - CORS middleware applying `OriginGate` decisions
//! - Tenant context middleware tagging requests and responses with the
//!   resolved market
//! - Tenant introspection routes (`/tenants`, `/resolve`)

pub mod middleware;
pub mod tenants;
pub mod types;

pub use middleware::{
    IngressState, eds_cors_middleware, tenant_context_middleware, with_tenant_layers,
};
pub use types::{IngressError, IngressResult, ResolvedTenant};
