//! Tenant definitions as they appear in provisioning files

use marketgate_core::{DEFAULT_MARKET, Result, StaticTenantSource, TenantConfig};
use serde::{Deserialize, Serialize};

const DEFAULT_LOCALE: &str = "en-US";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Top-level layout of a tenants file
///
/// ```yaml
/// tenants:
///   - market: uk
///     locale: en-GB
///     currency: GBP
///     timezone: Europe/London
///     eds_host: main--qsr-uk--org.aem.live
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantsFile {
    #[serde(default)]
    pub tenants: Vec<TenantDefinition>,
}

/// One tenant entry
///
/// Omitted fields take the provisioning defaults (the `us` market). An
/// explicitly empty string is kept as-is, so `locale: ""` fails validation
/// instead of silently becoming `en-US`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default, alias = "edsHost", skip_serializing_if = "Option::is_none")]
    pub eds_host: Option<String>,

    #[serde(default, alias = "contentRoot", skip_serializing_if = "Option::is_none")]
    pub content_root: Option<String>,
}

impl TenantDefinition {
    fn full(market: &str, locale: &str, currency: &str, timezone: &str) -> Self {
        Self {
            market: Some(market.to_string()),
            locale: Some(locale.to_string()),
            currency: Some(currency.to_string()),
            timezone: Some(timezone.to_string()),
            eds_host: None,
            content_root: None,
        }
    }

    /// Apply defaults and validate into a `TenantConfig`
    ///
    /// `eds_host` and `content_root` default to the market's conventional
    /// `main--qsr-{market}--org.aem.live` and `/content/qsr/{market}`.
    ///
    /// # Errors
    /// - `Error::Validation` if `market`, `locale` or `content_root` is empty
    pub fn to_config(&self) -> Result<TenantConfig> {
        let market = self.market.as_deref().unwrap_or(DEFAULT_MARKET);
        let eds_host = self
            .eds_host
            .clone()
            .unwrap_or_else(|| format!("main--qsr-{}--org.aem.live", market));
        let content_root = self
            .content_root
            .clone()
            .unwrap_or_else(|| format!("/content/qsr/{}", market));

        Ok(TenantConfig::new(
            market,
            self.locale.as_deref().unwrap_or(DEFAULT_LOCALE),
            content_root,
        )?
        .with_currency(self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))
        .with_timezone(self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE))
        .with_eds_host(eds_host))
    }
}

/// The markets served out of the box
pub fn builtin_markets() -> Vec<TenantDefinition> {
    vec![
        TenantDefinition::full("us", "en-US", "USD", "America/Los_Angeles"),
        TenantDefinition::full("uk", "en-GB", "GBP", "Europe/London"),
        TenantDefinition::full("jp", "ja-JP", "JPY", "Asia/Tokyo"),
    ]
}

/// Tenant source serving [`builtin_markets`]
pub fn builtin_source() -> Result<StaticTenantSource> {
    let tenants = builtin_markets()
        .iter()
        .map(TenantDefinition::to_config)
        .collect::<Result<Vec<_>>>()?;
    Ok(StaticTenantSource::new("builtin markets", tenants))
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketgate_core::Error;

    #[test]
    fn test_empty_definition_is_default_market() {
        let config = TenantDefinition::default().to_config().unwrap();
        assert_eq!(config.market(), "us");
        assert_eq!(config.locale(), "en-US");
        assert_eq!(config.currency(), "USD");
        assert_eq!(config.timezone(), "America/Los_Angeles");
        assert_eq!(config.eds_host(), "main--qsr-us--org.aem.live");
        assert_eq!(config.content_root(), "/content/qsr/us");
    }

    #[test]
    fn test_market_drives_derived_defaults() {
        let definition = TenantDefinition {
            market: Some("de".to_string()),
            ..Default::default()
        };
        let config = definition.to_config().unwrap();
        assert_eq!(config.eds_host(), "main--qsr-de--org.aem.live");
        assert_eq!(config.content_root(), "/content/qsr/de");
    }

    #[test]
    fn test_explicit_empty_values_are_kept() {
        let definition = TenantDefinition {
            market: Some("uk".to_string()),
            currency: Some(String::new()),
            eds_host: Some(String::new()),
            ..Default::default()
        };
        let config = definition.to_config().unwrap();
        assert_eq!(config.currency(), "");
        assert_eq!(config.eds_host(), "");
    }

    #[test]
    fn test_explicit_empty_required_field_fails() {
        let definition = TenantDefinition {
            market: Some("uk".to_string()),
            locale: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(definition.to_config(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_camel_case_aliases() {
        let definition: TenantDefinition = serde_yaml::from_str(
            "market: jp\nedsHost: main--qsr-jp--org.aem.live\ncontentRoot: /content/qsr/jp\n",
        )
        .unwrap();
        assert_eq!(definition.eds_host.as_deref(), Some("main--qsr-jp--org.aem.live"));
        assert_eq!(definition.content_root.as_deref(), Some("/content/qsr/jp"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: std::result::Result<TenantDefinition, _> =
            serde_yaml::from_str("market: jp\nregion: apac\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_builtin_markets_are_valid_and_distinct() {
        let configs: Vec<_> = builtin_markets()
            .iter()
            .map(|d| d.to_config().unwrap())
            .collect();
        assert_eq!(configs.len(), 3);

        let mut keys: Vec<_> = configs.iter().map(|c| c.host_key().to_string()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 3);

        let jp = configs.iter().find(|c| c.market() == "jp").unwrap();
        assert_eq!(jp.currency(), "JPY");
        assert_eq!(jp.timezone(), "Asia/Tokyo");
    }
}
