//! Pool Selection Tests.
//!
//! Verifies each routing strategy and the checks that a strategy's pools exist.

use mcsim_core::common::{ConfigError, LineAddr};
use mcsim_core::config::Routing;
use mcsim_core::mc::PoolId;
use mcsim_core::mc::routing::build_selector;

#[test]
fn in_package_first_prefers_in_package() {
    let sel = build_selector(Routing::InPackageFirst, true, true).unwrap();
    assert_eq!(sel.select(LineAddr::new(0)), PoolId::InPackage);
    assert_eq!(sel.select(LineAddr::new(1)), PoolId::InPackage);
    assert_eq!(sel.policy(), Routing::InPackageFirst);
}

#[test]
fn in_package_first_falls_back_to_external() {
    let sel = build_selector(Routing::InPackageFirst, true, false).unwrap();
    assert_eq!(sel.select(LineAddr::new(7)), PoolId::External);
}

#[test]
fn external_only_ignores_in_package() {
    let sel = build_selector(Routing::ExternalOnly, true, true).unwrap();
    for line in 0..8 {
        assert_eq!(sel.select(LineAddr::new(line)), PoolId::External);
    }
}

#[test]
fn parity_split_by_low_bit() {
    let sel = build_selector(Routing::ParitySplit, true, true).unwrap();
    assert_eq!(sel.select(LineAddr::new(0)), PoolId::InPackage);
    assert_eq!(sel.select(LineAddr::new(1)), PoolId::External);
    assert_eq!(sel.select(LineAddr::new(138)), PoolId::InPackage);
    assert_eq!(sel.select(LineAddr::new(139)), PoolId::External);
}

#[test]
fn external_only_needs_external_pool() {
    let err = build_selector(Routing::ExternalOnly, false, true).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::RoutingNeedsPool {
            policy: "externalOnly",
            pool: "external"
        }
    ));
}

#[test]
fn parity_split_needs_both_pools() {
    assert!(build_selector(Routing::ParitySplit, true, false).is_err());
    assert!(build_selector(Routing::ParitySplit, false, true).is_err());
}

#[test]
fn routing_names_round_trip() {
    for policy in [
        Routing::InPackageFirst,
        Routing::ExternalOnly,
        Routing::ParitySplit,
    ] {
        assert_eq!(policy.as_str().parse::<Routing>().unwrap(), policy);
    }
    assert!(matches!(
        "random".parse::<Routing>(),
        Err(ConfigError::UnknownRouting(name)) if name == "random"
    ));
}

#[test]
fn pool_id_display() {
    assert_eq!(PoolId::External.to_string(), "external");
    assert_eq!(PoolId::InPackage.to_string(), "in-package");
}
