use worldsync::sim::{ManualTickHost, SimRegionHost};
use worldsync::{
    build_strategy, select_strategy, HostEnvironment, StrategyKind, SyncError, ENTITY_EXECUTE,
};

#[test]
fn test_full_region_host_selects_region_affine() {
    let host = SimRegionHost::new();
    let env = HostEnvironment::new()
        .with_capabilities(host.capabilities())
        .with_tick_host(ManualTickHost::new());
    assert_eq!(env.detect(), StrategyKind::RegionAffine);
    assert_eq!(select_strategy(&env).unwrap().name(), "region-affine");
}

#[test]
fn test_tick_host_selects_global_serial() {
    let env = HostEnvironment::new().with_tick_host(ManualTickHost::new());
    assert_eq!(select_strategy(&env).unwrap().name(), "global-serial");
}

#[test]
fn test_broken_region_host_without_tick_falls_back_to_isolated() {
    let host = SimRegionHost::new();
    let env = HostEnvironment::new().with_capabilities(host.capabilities_without(ENTITY_EXECUTE));

    let err = build_strategy(&env, StrategyKind::RegionAffine).err();
    assert_eq!(err, Some(SyncError::CapabilityMissing { name: ENTITY_EXECUTE }));

    let strategy = select_strategy(&env).unwrap();
    assert_eq!(strategy.name(), "isolated-thread");
    strategy.dispose_all();
}

#[test]
fn test_bare_host_selects_isolated() {
    let strategy = select_strategy(&HostEnvironment::new()).unwrap();
    assert_eq!(strategy.name(), "isolated-thread");
    strategy.dispose_all();
}
