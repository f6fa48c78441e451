//! Tenant provisioning wiring
//!
//! Picks the tenant source from the server config, runs the initial sync and
//! keeps following file changes in the background.

use anyhow::Context;
use marketgate_config_file::{FileTenantSource, builtin_source};
use marketgate_core::{DEFAULT_MARKET, TenantProvisioner, TenantRegistry, TenantSource};
use marketgate_observability::{Metrics, ReadinessChecker};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServerConfig;

/// Where tenants come from
pub enum Provisioning {
    /// A provisioning file, optionally watched for changes
    File(Arc<FileTenantSource>),
    /// The built-in market set
    Builtin(Arc<dyn TenantSource>),
    /// Nothing provisioned; origins are checked against the edge pattern only
    Bootstrap,
}

impl Provisioning {
    pub async fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        if let Some(path) = &config.tenants_file {
            let source = FileTenantSource::new(path.clone())
                .await
                .with_context(|| format!("Tenants file {} is not usable", path.display()))?;
            return Ok(Provisioning::File(Arc::new(source)));
        }

        if config.builtin_markets {
            return Ok(Provisioning::Builtin(Arc::new(builtin_source()?)));
        }

        Ok(Provisioning::Bootstrap)
    }

    fn source(&self) -> Option<Arc<dyn TenantSource>> {
        match self {
            Provisioning::File(source) => Some(source.clone() as Arc<dyn TenantSource>),
            Provisioning::Builtin(source) => Some(source.clone()),
            Provisioning::Bootstrap => None,
        }
    }

    /// Run the initial sync; a failure here aborts startup
    pub async fn initial_sync(
        &self,
        provisioner: &TenantProvisioner,
        metrics: &Metrics,
    ) -> anyhow::Result<()> {
        let Some(source) = self.source() else {
            warn!("No tenant source configured, running in bootstrap mode");
            return Ok(());
        };

        let outcome = provisioner.sync(source.as_ref()).await;
        metrics.record_tenant_sync(outcome.is_ok());
        let report = outcome
            .with_context(|| format!("Failed to provision tenants from {}", source.name()))?;

        for (market, reason) in &report.rejected {
            warn!("Tenant {} was not registered: {}", market, reason);
        }
        metrics.set_registered_tenants(provisioner.registry().len());
        Ok(())
    }

    /// Follow the tenants file in the background when watching is enabled
    pub fn spawn_watcher(
        &self,
        config: &ServerConfig,
        provisioner: Arc<TenantProvisioner>,
        metrics: Arc<Metrics>,
    ) -> Option<JoinHandle<()>> {
        let Provisioning::File(source) = self else {
            return None;
        };
        if !config.watch_tenants {
            info!("Tenant file watching disabled");
            return None;
        }

        let source = source.clone();
        Some(tokio::spawn(async move {
            let registry = provisioner.registry().clone();
            let result = provisioner
                .follow(source.as_ref(), |outcome| {
                    metrics.record_tenant_sync(outcome.is_ok());
                    metrics.set_registered_tenants(registry.len());
                })
                .await;

            if let Err(e) = result {
                error!("Tenant file watcher stopped: {}", e);
            }
        }))
    }
}

/// Ready once the default market is registered
pub struct RegistryReadiness {
    registry: Arc<TenantRegistry>,
}

impl RegistryReadiness {
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self { registry }
    }
}

impl ReadinessChecker for RegistryReadiness {
    fn is_ready(&self) -> bool {
        self.registry.get_default().is_some()
    }

    fn tenant_count(&self) -> usize {
        self.registry.len()
    }

    fn not_ready_reason(&self) -> String {
        format!("Default tenant '{}' is not registered", DEFAULT_MARKET)
    }
}
