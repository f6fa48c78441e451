//! Integration tests for OriginGate decisions

use http::Method;
use http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use marketgate_core::{
    AllowedBy, DenyReason, OriginGate, OriginVerdict, TenantConfig, TenantRegistry,
};
use std::sync::Arc;

fn us_registry() -> Arc<TenantRegistry> {
    let registry = Arc::new(TenantRegistry::new());
    registry.register(
        TenantConfig::new("us", "en-US", "/content/qsr/us")
            .unwrap()
            .with_eds_host("main--qsr-us--org.aem.live"),
    );
    registry
}

#[test]
fn test_foreign_origin_denied() {
    let gate = OriginGate::new(us_registry());
    assert!(!gate.evaluate(Some("https://evil.example.com")).is_allowed());
}

#[test]
fn test_empty_registry_is_bootstrap_mode() {
    let gate = OriginGate::new(Arc::new(TenantRegistry::new()));
    assert_eq!(
        gate.evaluate(Some("https://branch--site--org.aem.live")),
        OriginVerdict::Allowed(AllowedBy::Bootstrap)
    );
}

#[test]
fn test_registry_emptied_at_runtime_returns_to_bootstrap() {
    let registry = us_registry();
    let gate = OriginGate::new(Arc::clone(&registry));
    let origin = Some("https://main--qsr-uk--org.aem.live");

    assert!(!gate.evaluate(origin).is_allowed());
    registry.unregister("us");
    assert!(gate.evaluate(origin).is_allowed());
}

#[test]
fn test_registered_tenant_shares_key_across_domains() {
    let gate = OriginGate::new(us_registry());
    assert_eq!(
        gate.evaluate(Some("https://main--qsr-us--org.hlx.page")),
        OriginVerdict::Allowed(AllowedBy::Tenant)
    );
    assert_eq!(
        gate.evaluate(Some("https://main--qsr-uk--org.aem.live")),
        OriginVerdict::Denied(DenyReason::UnknownTenantHost)
    );
}

#[test]
fn test_tenant_without_eds_host_never_matches() {
    let registry = Arc::new(TenantRegistry::new());
    registry.register(TenantConfig::new("us", "en-US", "/content/qsr/us").unwrap());
    let gate = OriginGate::new(registry);

    assert_eq!(
        gate.evaluate(Some("https://main--qsr-us--org.aem.live")),
        OriginVerdict::Denied(DenyReason::UnknownTenantHost)
    );
}

#[test]
fn test_options_short_circuits_but_get_does_not() {
    let gate = OriginGate::new(us_registry());
    let origin = Some("https://main--qsr-us--org.aem.live");

    let preflight = gate.decide(origin, &Method::OPTIONS);
    assert!(preflight.is_allowed());
    assert!(preflight.short_circuit);

    let get = gate.decide(origin, &Method::GET);
    assert!(get.is_allowed());
    assert!(!get.short_circuit);
    assert!(get
        .headers
        .iter()
        .any(|(name, value)| name == ACCESS_CONTROL_ALLOW_ORIGIN && value != "*"));
}

#[test]
fn test_denied_preflight_is_not_short_circuited() {
    let gate = OriginGate::without_registry();
    let decision = gate.decide(Some("https://evil.example.com"), &Method::OPTIONS);
    assert!(!decision.short_circuit);
    assert!(decision.headers.is_empty());
}
