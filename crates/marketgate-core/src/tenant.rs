//! Tenant configuration value object

use serde::Serialize;
use std::fmt;

use crate::{Error, Result};

/// Market code of the fallback tenant.
///
/// It is not registered automatically; a tenant with this code must be
/// provisioned explicitly to act as the default.
pub const DEFAULT_MARKET: &str = "us";

/// Immutable per-market configuration.
///
/// Each market (us, uk, jp, ...) is a separate tenant with its own locale,
/// currency, edge-delivery host and content root. Required fields are checked
/// once at construction; afterwards the value never changes, so it can be
/// shared freely between request handlers behind an `Arc`.
///
/// ```
/// # use marketgate_core::TenantConfig;
/// let uk = TenantConfig::new("uk", "en-GB", "/content/qsr/uk")?
///     .with_currency("GBP")
///     .with_timezone("Europe/London")
///     .with_eds_host("main--qsr-uk--org.aem.live");
/// assert_eq!(uk.host_key(), "main--qsr-uk--org");
/// # Ok::<(), marketgate_core::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    market: String,
    locale: String,
    currency: String,
    timezone: String,
    eds_host: String,
    content_root: String,
}

impl TenantConfig {
    /// Create a tenant from its required fields
    ///
    /// # Errors
    /// - `Error::Validation` if `market`, `locale` or `content_root` is empty
    pub fn new(
        market: impl Into<String>,
        locale: impl Into<String>,
        content_root: impl Into<String>,
    ) -> Result<Self> {
        let market = market.into();
        let locale = locale.into();
        let content_root = content_root.into();

        require("market", &market)?;
        require("locale", &locale)?;
        require("contentRoot", &content_root)?;

        Ok(Self {
            market,
            locale,
            currency: String::new(),
            timezone: String::new(),
            eds_host: String::new(),
            content_root,
        })
    }

    /// Set the ISO-4217 currency code
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Set the IANA timezone
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Set the edge-delivery live host
    pub fn with_eds_host(mut self, eds_host: impl Into<String>) -> Self {
        self.eds_host = eds_host.into();
        self
    }

    /// Market code, e.g. `us`, `uk`, `jp`
    pub fn market(&self) -> &str {
        &self.market
    }

    /// BCP-47 locale, e.g. `en-US`
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// ISO-4217 currency code, possibly empty
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// IANA timezone, possibly empty
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Edge-delivery host, e.g. `main--qsr-us--org.aem.live`, possibly empty
    pub fn eds_host(&self) -> &str {
        &self.eds_host
    }

    /// Content root path, e.g. `/content/qsr/us`
    pub fn content_root(&self) -> &str {
        &self.content_root
    }

    /// Matching key of this tenant's edge-delivery host
    pub fn host_key(&self) -> &str {
        host_key(&self.eds_host)
    }
}

impl fmt::Display for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.market, self.locale)
    }
}

/// Extract the matching key of a hostname.
///
/// Edge-delivery hosts look like `{branch}--{site}--{org}.{suffix}`. The part
/// before the first `.` identifies the site while the suffix differs between
/// preview and live domains, so only the prefix is compared.
///
/// ```
/// # use marketgate_core::host_key;
/// assert_eq!(host_key("main--qsr-us--org.hlx.page"), "main--qsr-us--org");
/// assert_eq!(host_key("localhost"), "localhost");
/// ```
pub fn host_key(hostname: &str) -> &str {
    hostname
        .split_once('.')
        .map_or(hostname, |(prefix, _)| prefix)
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!(
            "{} must not be null or empty",
            field
        )));
    }
    Ok(())
}
