//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for MarketGate:
//! - Origin decisions (allowed/denied, by reason)
//! - Tenant resolutions by source (path, default, unresolved)
//! - Registered tenant count
//! - Tenant provisioning syncs

use prometheus::{CounterVec, Gauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for MarketGate
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Origin gate verdicts
    pub origin_decisions_total: CounterVec,
    /// Path-to-tenant resolutions
    pub tenant_resolutions_total: CounterVec,
    /// Tenants currently registered
    pub registered_tenants: Gauge,
    /// Provisioning passes (ok/error)
    pub tenant_syncs_total: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let origin_decisions_total = CounterVec::new(
            Opts::new(
                "marketgate_origin_decisions_total",
                "Cross-origin decisions made by the origin gate",
            ),
            &["outcome", "reason"],
        )?;

        let tenant_resolutions_total = CounterVec::new(
            Opts::new(
                "marketgate_tenant_resolutions_total",
                "Tenant resolutions by how the tenant was found",
            ),
            &["source"],
        )?;

        let registered_tenants = Gauge::with_opts(Opts::new(
            "marketgate_registered_tenants",
            "Number of tenants currently registered",
        ))?;

        let tenant_syncs_total = CounterVec::new(
            Opts::new(
                "marketgate_tenant_syncs_total",
                "Tenant provisioning passes",
            ),
            &["result"],
        )?;

        registry.register(Box::new(origin_decisions_total.clone()))?;
        registry.register(Box::new(tenant_resolutions_total.clone()))?;
        registry.register(Box::new(registered_tenants.clone()))?;
        registry.register(Box::new(tenant_syncs_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            origin_decisions_total,
            tenant_resolutions_total,
            registered_tenants,
            tenant_syncs_total,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record an origin gate verdict
    pub fn record_origin_decision(&self, outcome: &str, reason: &str) {
        self.origin_decisions_total
            .with_label_values(&[outcome, reason])
            .inc();
    }

    /// Record how a request's tenant was resolved
    pub fn record_resolution(&self, source: &str) {
        self.tenant_resolutions_total
            .with_label_values(&[source])
            .inc();
    }

    /// Update the registered tenant gauge
    pub fn set_registered_tenants(&self, count: usize) {
        self.registered_tenants.set(count as f64);
    }

    /// Record a provisioning pass
    pub fn record_tenant_sync(&self, success: bool) {
        let result = if success { "ok" } else { "error" };
        self.tenant_syncs_total.with_label_values(&[result]).inc();
    }
}
