//! Concurrent tenant registry
//!
//! The registry is the authoritative set of tenant configurations, keyed by
//! market code. It is read on every request (path resolution, origin
//! matching) and written by provisioning (startup, file reloads), so it is
//! backed by a sharded `DashMap` rather than a single lock.
//!
//! Entries are stored as `Arc<TenantConfig>`: lookups and snapshots hand out
//! cheap clones of an immutable value and never observe a partial update.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::tenant::{DEFAULT_MARKET, TenantConfig, host_key};
use crate::{Error, Result};

/// Outcome of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// No tenant was registered under this market before
    Inserted,
    /// A different config for this market was replaced (last write wins)
    Replaced,
    /// An identical config was already registered
    Unchanged,
}

/// How `resolve` arrived at its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// The market segment of the path named a registered tenant
    Path,
    /// The path did not name a registered tenant; the default tenant was used
    Default,
    /// Neither the path market nor the default tenant is registered
    Unresolved,
}

impl ResolutionSource {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Path => "path",
            ResolutionSource::Default => "default",
            ResolutionSource::Unresolved => "unresolved",
        }
    }
}

/// Tenant returned by `resolve_detailed` together with its source
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tenant: Option<Arc<TenantConfig>>,
    pub source: ResolutionSource,
}

/// Registry of tenant configurations
///
/// Construct one per process and share it as `Arc<TenantRegistry>`; tests
/// build fresh instances for isolation.
#[derive(Debug, Default)]
pub struct TenantRegistry {
    /// Map: market code → tenant
    tenants: DashMap<String, Arc<TenantConfig>>,
    /// Serializes checked writers so a conflict check and the insert that
    /// follows it are atomic
    provisioning: Mutex<()>,
}

impl TenantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the tenant for `config.market()`.
    ///
    /// Never fails. If another market already owns the same edge-delivery
    /// matching key a warning is logged and the tenant is registered anyway;
    /// use [`TenantRegistry::try_register`] to reject such collisions.
    pub fn register(&self, config: TenantConfig) -> Registration {
        if let Some(existing) = self.host_key_owner(config.host_key(), config.market()) {
            warn!(
                market = config.market(),
                existing_market = %existing,
                host_key = config.host_key(),
                "EDS host key already registered by another market; origin matching is ambiguous"
            );
        }
        self.insert(config)
    }

    /// Register a tenant, rejecting edge-delivery host collisions.
    ///
    /// # Errors
    /// - `Error::EdsHostConflict` if a different market already uses the same
    ///   matching key
    pub fn try_register(&self, config: TenantConfig) -> Result<Registration> {
        let _guard = self.lock_provisioning();

        if let Some(existing_market) = self.host_key_owner(config.host_key(), config.market()) {
            return Err(Error::EdsHostConflict {
                host_key: config.host_key().to_string(),
                market: config.market().to_string(),
                existing_market,
            });
        }

        Ok(self.insert(config))
    }

    /// Remove the tenant for `market`, returning it if it was registered
    pub fn unregister(&self, market: &str) -> Option<Arc<TenantConfig>> {
        let removed = self.tenants.remove(market).map(|(_, tenant)| tenant);
        if removed.is_some() {
            debug!("Unregistered tenant '{}'", market);
        }
        removed
    }

    /// Exact lookup by market code
    pub fn get_tenant(&self, market: &str) -> Option<Arc<TenantConfig>> {
        self.tenants
            .get(market)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// The tenant registered under [`DEFAULT_MARKET`], if any
    pub fn get_default(&self) -> Option<Arc<TenantConfig>> {
        self.get_tenant(DEFAULT_MARKET)
    }

    /// Point-in-time snapshot of all registered tenants (unordered)
    pub fn all_tenants(&self) -> Vec<Arc<TenantConfig>> {
        self.tenants
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of registered tenants
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Whether no tenant is registered
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Resolve the tenant owning a content path.
    ///
    /// Paths follow `/content/qsr/{market}/...`. Anything else, including no
    /// path at all, resolves to the default tenant. Returns `None` only when
    /// the default tenant is not registered either.
    ///
    /// ```
    /// # use marketgate_core::{TenantConfig, TenantRegistry};
    /// let registry = TenantRegistry::new();
    /// registry.register(TenantConfig::new("us", "en-US", "/content/qsr/us")?);
    ///
    /// let tenant = registry.resolve("/content/qsr/uk/menu").unwrap();
    /// assert_eq!(tenant.market(), "us");
    /// assert!(registry.resolve(None).is_some());
    /// # Ok::<(), marketgate_core::Error>(())
    /// ```
    pub fn resolve<'a>(
        &self,
        resource_path: impl Into<Option<&'a str>>,
    ) -> Option<Arc<TenantConfig>> {
        self.resolve_detailed(resource_path).tenant
    }

    /// Same as [`TenantRegistry::resolve`] but also reports the source
    pub fn resolve_detailed<'a>(
        &self,
        resource_path: impl Into<Option<&'a str>>,
    ) -> Resolution {
        if let Some(market) = resource_path.into().and_then(market_from_path)
            && let Some(tenant) = self.get_tenant(market)
        {
            return Resolution {
                tenant: Some(tenant),
                source: ResolutionSource::Path,
            };
        }

        match self.get_default() {
            Some(tenant) => Resolution {
                tenant: Some(tenant),
                source: ResolutionSource::Default,
            },
            None => Resolution {
                tenant: None,
                source: ResolutionSource::Unresolved,
            },
        }
    }

    /// Whether `hostname` belongs to a registered tenant's edge-delivery site
    pub fn is_allowed_eds_origin(&self, hostname: &str) -> bool {
        self.find_eds_origin(hostname).is_some()
    }

    /// Find the tenant whose edge-delivery host shares `hostname`'s matching key.
    ///
    /// An empty key never matches, so tenants without an EDS host are never
    /// returned. If several tenants share a key the first one found wins.
    pub fn find_eds_origin(&self, hostname: &str) -> Option<Arc<TenantConfig>> {
        let key = host_key(hostname);
        if key.is_empty() {
            return None;
        }

        self.tenants
            .iter()
            .find(|entry| entry.value().host_key() == key)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Lock shared by every writer that checks host keys before inserting
    pub(crate) fn lock_provisioning(&self) -> MutexGuard<'_, ()> {
        self.provisioning
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace without any host key check
    pub(crate) fn insert(&self, config: TenantConfig) -> Registration {
        let outcome = match self.tenants.entry(config.market().to_string()) {
            Entry::Occupied(mut entry) => {
                if **entry.get() == config {
                    Registration::Unchanged
                } else {
                    entry.insert(Arc::new(config));
                    Registration::Replaced
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(config));
                Registration::Inserted
            }
        };
        debug!("Tenant registration: {:?}", outcome);
        outcome
    }

    /// Market other than `market` that already uses `key`, if any
    fn host_key_owner(&self, key: &str, market: &str) -> Option<String> {
        self.host_key_owner_where(key, |owner| owner != market)
    }

    /// First registered market accepted by `include` that uses `key`
    pub(crate) fn host_key_owner_where<F>(&self, key: &str, include: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        if key.is_empty() {
            return None;
        }

        self.tenants
            .iter()
            .find(|entry| include(entry.key().as_str()) && entry.value().host_key() == key)
            .map(|entry| entry.key().clone())
    }
}

/// Extract the market segment from `/content/qsr/{market}/...`
fn market_from_path(path: &str) -> Option<&str> {
    let mut segments = path.split('/');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_), Some("content"), Some("qsr"), Some(market)) => Some(market),
        _ => None,
    }
}
