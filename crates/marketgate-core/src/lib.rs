//! MarketGate Core Types
//!
//! This crate provides the tenant registry and origin-validation engine:
//! - `TenantConfig` value object for a single market
//! - `TenantRegistry` for concurrent registration and path resolution
//! - `OriginGate` for edge-delivery CORS decisions
//! - `TenantSource` trait and `TenantProvisioner` for keeping the registry in sync
//! - Core error types

pub mod error;
pub mod origin;
pub mod registry;
pub mod source;
pub mod tenant;

pub use error::{Error, Result};
pub use origin::{AllowedBy, CorsDecision, DenyReason, OriginGate, OriginVerdict};
pub use registry::{Registration, Resolution, ResolutionSource, TenantRegistry};
pub use source::{StaticTenantSource, SyncReport, TenantChange, TenantProvisioner, TenantSource};
pub use tenant::{DEFAULT_MARKET, TenantConfig, host_key};
