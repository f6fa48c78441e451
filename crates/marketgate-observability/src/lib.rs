//! MarketGate Observability
//!
//! This crate provides observability features:
//! - Metrics collection (Prometheus)
//! - Health and readiness endpoints

pub mod health;
pub mod metrics;

pub use health::{HealthResponse, HealthState, ReadinessChecker, ReadinessResponse, health_router};
pub use metrics::Metrics;
