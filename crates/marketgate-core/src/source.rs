//! Tenant sources and registry provisioning
//!
//! A `TenantSource` supplies the full set of tenant definitions (a file, a
//! built-in list, ...). The `TenantProvisioner` applies that set to a
//! `TenantRegistry`: new markets are registered, changed ones replaced and
//! markets that disappeared from the source are unregistered. Writes come
//! before removals, so the registry is never empty part way through a sync.

use async_trait::async_trait;
use futures::lock::Mutex;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::registry::{Registration, TenantRegistry};
use crate::tenant::TenantConfig;
use crate::{Error, Result};

/// Type alias for tenant change streams
pub type TenantChangeStream<'a> = BoxStream<'a, Result<TenantChange>>;

/// Notification that a source's tenant set may have changed
#[derive(Debug, Clone)]
pub struct TenantChange {
    /// Timestamp of the change
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Source version counter
    pub version: u32,
}

/// Supplier of tenant definitions
///
/// Implementations:
/// - `StaticTenantSource`: fixed list, never changes
/// - `FileTenantSource` (marketgate-config-file): YAML/TOML file with watching
#[async_trait]
pub trait TenantSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> String;

    /// Load the complete current set of tenants
    ///
    /// # Errors
    /// - `Error::Validation` if a definition is missing a required field
    /// - `Error::Config` / `Error::Io` for source-specific failures
    async fn load_tenants(&self) -> Result<Vec<TenantConfig>>;

    /// Watch for changes to the tenant set
    ///
    /// The default implementation never emits.
    async fn watch_changes(&self) -> Result<TenantChangeStream<'_>> {
        Ok(Box::pin(stream::empty()))
    }
}

/// Fixed list of tenants
#[derive(Debug, Clone)]
pub struct StaticTenantSource {
    name: String,
    tenants: Vec<TenantConfig>,
}

impl StaticTenantSource {
    pub fn new(name: impl Into<String>, tenants: Vec<TenantConfig>) -> Self {
        Self {
            name: name.into(),
            tenants,
        }
    }
}

#[async_trait]
impl TenantSource for StaticTenantSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn load_tenants(&self) -> Result<Vec<TenantConfig>> {
        Ok(self.tenants.clone())
    }
}

/// Summary of one provisioning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Markets registered for the first time
    pub registered: Vec<String>,
    /// Markets whose configuration was replaced
    pub replaced: Vec<String>,
    /// Markets already registered with an identical configuration
    pub unchanged: usize,
    /// Markets removed because the source no longer lists them
    pub removed: Vec<String>,
    /// Markets refused by the registry, with the reason
    pub rejected: Vec<(String, String)>,
}

impl SyncReport {
    /// Whether the pass changed the registry
    pub fn has_changes(&self) -> bool {
        !self.registered.is_empty() || !self.replaced.is_empty() || !self.removed.is_empty()
    }
}

/// Applies tenant sources to a registry
///
/// The provisioner remembers which markets it registered so that a later
/// sync only removes its own tenants, never ones registered by other code.
#[derive(Debug)]
pub struct TenantProvisioner {
    registry: Arc<TenantRegistry>,
    owned: Mutex<HashSet<String>>,
}

impl TenantProvisioner {
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self {
            registry,
            owned: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    /// Load `source` and bring the registry in line with it.
    ///
    /// Nothing is changed if the source fails to load, lists the same market
    /// twice, or lists no tenants while this provisioner still owns some.
    /// Host conflicts are judged against the set the sync ends with, so two
    /// markets may swap hosts in one pass. A market whose host key is used by
    /// an earlier entry of the same source, or by a tenant registered outside
    /// this provisioner, is skipped and listed in `SyncReport::rejected`.
    ///
    /// New and changed tenants are written before stale ones are removed, so
    /// a concurrent reader never sees the registry empty mid-sync.
    ///
    /// # Errors
    /// - Any error from `TenantSource::load_tenants`
    /// - `Error::Config` if a market is defined more than once
    /// - `Error::Config` if the source is empty and tenants are provisioned
    pub async fn sync(&self, source: &dyn TenantSource) -> Result<SyncReport> {
        let mut owned = self.owned.lock().await;

        let tenants = source.load_tenants().await?;
        let incoming = unique_markets(&tenants)?;

        if incoming.is_empty() && !owned.is_empty() {
            return Err(Error::Config(format!(
                "{} lists no tenants; keeping the {} provisioned market(s)",
                source.name(),
                owned.len()
            )));
        }

        let report = self.apply(source, tenants, &incoming, &mut owned);

        info!(
            source = %source.name(),
            registered = report.registered.len(),
            replaced = report.replaced.len(),
            unchanged = report.unchanged,
            removed = report.removed.len(),
            rejected = report.rejected.len(),
            "Tenant sync complete"
        );
        Ok(report)
    }

    /// Re-sync every time `source` reports a change.
    ///
    /// A failed sync leaves the registry as it was; `on_sync` sees every
    /// outcome. Returns when the change stream ends.
    pub async fn follow<F>(&self, source: &dyn TenantSource, mut on_sync: F) -> Result<()>
    where
        F: FnMut(&Result<SyncReport>) + Send,
    {
        let mut changes = source.watch_changes().await?;

        while let Some(change) = changes.next().await {
            match change {
                Ok(change) => {
                    debug!(
                        "Tenant source {} changed (version {})",
                        source.name(),
                        change.version
                    );
                    let outcome = self.sync(source).await;
                    if let Err(e) = &outcome {
                        error!(
                            "Failed to reload tenants from {}, keeping previous set: {}",
                            source.name(),
                            e
                        );
                    }
                    on_sync(&outcome);
                }
                Err(e) => warn!("Tenant watch error from {}: {}", source.name(), e),
            }
        }

        debug!("Tenant change stream for {} ended", source.name());
        Ok(())
    }

    fn apply(
        &self,
        source: &dyn TenantSource,
        tenants: Vec<TenantConfig>,
        incoming: &HashSet<String>,
        owned: &mut HashSet<String>,
    ) -> SyncReport {
        let _guard = self.registry.lock_provisioning();
        let mut report = SyncReport::default();

        // Host key -> market, for the tenants this pass keeps
        let mut claimed: HashMap<String, String> = HashMap::new();
        let mut accepted = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            let market = tenant.market().to_string();
            let key = tenant.host_key().to_string();

            let conflict = match claimed.get(&key) {
                Some(claimant) => Some(claimant.clone()),
                None => self.registry.host_key_owner_where(&key, |other| {
                    other != market && !owned.contains(other) && !incoming.contains(other)
                }),
            };
            if let Some(existing_market) = conflict {
                let e = Error::EdsHostConflict {
                    host_key: key,
                    market: market.clone(),
                    existing_market,
                };
                warn!("Rejected tenant '{}' from {}: {}", market, source.name(), e);
                report.rejected.push((market, e.to_string()));
                continue;
            }

            if !key.is_empty() {
                claimed.insert(key, market);
            }
            accepted.push(tenant);
        }

        let mut kept = HashSet::with_capacity(accepted.len());
        for tenant in accepted {
            let market = tenant.market().to_string();
            match self.registry.insert(tenant) {
                Registration::Inserted => report.registered.push(market.clone()),
                Registration::Replaced => report.replaced.push(market.clone()),
                Registration::Unchanged => report.unchanged += 1,
            }
            owned.insert(market.clone());
            kept.insert(market);
        }

        // Markets gone from the source, and owned markets rejected this pass
        let mut stale: Vec<String> = owned.difference(&kept).cloned().collect();
        stale.sort();
        for market in stale {
            if self.registry.unregister(&market).is_some() {
                report.removed.push(market.clone());
            }
            owned.remove(&market);
        }

        report
    }
}

fn unique_markets(tenants: &[TenantConfig]) -> Result<HashSet<String>> {
    let mut markets = HashSet::with_capacity(tenants.len());
    for tenant in tenants {
        if !markets.insert(tenant.market().to_string()) {
            return Err(Error::Config(format!(
                "market '{}' is defined more than once",
                tenant.market()
            )));
        }
    }
    Ok(markets)
}
