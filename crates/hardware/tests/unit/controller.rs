//! Memory Controller Tests.
//!
//! Verifies construction from configuration, coherence grants, the clean-eviction bypass,
//! routing and interleaved dispatch, bookkeeping, stats layout and concurrent access.

use crate::common::harness::{ConfigBuilder, init_tracing};
use crate::common::mocks::device::{MockDevice, RequestLog, mock_devices, seen};
use mcsim_core::common::{ConfigError, ControllerError, LineAddr, ProtocolError};
use mcsim_core::config::{MemoryType, Routing};
use mcsim_core::mc::{BackendPool, PoolId, Route};
use mcsim_core::{AccessType, ControllerParams, MemRequest, MemoryController, MesiState, ReqFlags};
use std::thread;

const LATENCY: u64 = 100;

fn params() -> ControllerParams {
    ControllerParams::new("mem-0", 2000)
}

/// Controller over one external mock and `n` in-package mocks at granularity `g`.
fn mocked(
    n: usize,
    g: u64,
    routing: Routing,
) -> (MemoryController, RequestLog, Vec<RequestLog>) {
    init_tracing();
    let ext = MockDevice::new("mem-0-ext", LATENCY);
    let ext_log = ext.log();
    let (devices, logs) = mock_devices("mem-0-mc", n, LATENCY);
    let ctrl = MemoryController::with_pools(
        "mem-0",
        64,
        Some(BackendPool::single(MemoryType::Ddr, Box::new(ext))),
        Some(BackendPool::interleaved(MemoryType::Ddr, devices, g).unwrap()),
        routing,
    )
    .unwrap();
    (ctrl, ext_log, logs)
}

fn external_only() -> (MemoryController, RequestLog) {
    let ext = MockDevice::new("mem-0-ext", LATENCY);
    let log = ext.log();
    let ctrl = MemoryController::with_pools(
        "mem-0",
        64,
        Some(BackendPool::single(MemoryType::Ddr, Box::new(ext))),
        None,
        Routing::InPackageFirst,
    )
    .unwrap();
    (ctrl, log)
}

fn total(logs: &[RequestLog]) -> usize {
    logs.iter().map(seen).sum()
}

// ══════════════════════════════════════════════════════════
// 1. Construction from configuration
// ══════════════════════════════════════════════════════════

#[test]
fn builds_external_pool_only() {
    let cfg = ConfigBuilder::new().external().build();
    let ctrl = MemoryController::new(params(), &cfg).unwrap();
    assert_eq!(ctrl.external_devices(), 1);
    assert_eq!(ctrl.in_package_devices(), 0);
    assert_eq!(ctrl.name(), "mem-0");
    assert_eq!(ctrl.line_size(), 64);
    assert_eq!(ctrl.routing(), Routing::InPackageFirst);
}

#[test]
fn builds_in_package_pool_only() {
    let cfg = ConfigBuilder::new().in_package(4).build();
    let ctrl = MemoryController::new(params(), &cfg).unwrap();
    assert_eq!(ctrl.external_devices(), 0);
    assert_eq!(ctrl.in_package_devices(), 4);
}

#[test]
fn builds_both_pools() {
    let cfg = ConfigBuilder::new().external().in_package(2).build();
    let ctrl = MemoryController::new(params(), &cfg).unwrap();
    assert_eq!(ctrl.external_devices(), 1);
    assert_eq!(ctrl.in_package_devices(), 2);
}

#[test]
fn no_pool_is_fatal() {
    let cfg = ConfigBuilder::new().build();
    let err = MemoryController::new(params(), &cfg).unwrap_err();
    assert!(matches!(
        &err,
        ControllerError::Config { name, source: ConfigError::NoMemory } if name == "mem-0"
    ));
    assert!(err.to_string().starts_with("[mem-0] "));
}

#[test]
fn zero_in_package_devices_means_no_pool() {
    let cfg = ConfigBuilder::new().in_package(0).build();
    assert!(matches!(
        MemoryController::new(params(), &cfg),
        Err(ControllerError::Config {
            source: ConfigError::NoMemory,
            ..
        })
    ));

    let cfg = ConfigBuilder::new().external().in_package(0).build();
    let ctrl = MemoryController::new(params(), &cfg).unwrap();
    assert_eq!(ctrl.in_package_devices(), 0);
}

#[test]
fn unsupported_memory_type_is_fatal() {
    let cfg = ConfigBuilder::new()
        .external()
        .set("sys.mem.ext_dram.type", serde_json::json!("HBM"))
        .build();
    let err = MemoryController::new(params(), &cfg).unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Config {
            source: ConfigError::UnsupportedMemoryType { ref kind, .. },
            ..
        } if kind == "HBM"
    ));
}

#[test]
fn zero_granularity_is_fatal() {
    let cfg = ConfigBuilder::new().in_package(2).granularity(0).build();
    assert!(matches!(
        MemoryController::new(params(), &cfg),
        Err(ControllerError::Config {
            source: ConfigError::ZeroGranularity,
            ..
        })
    ));
}

#[test]
fn routing_is_read_from_config() {
    let cfg = ConfigBuilder::new()
        .external()
        .in_package(2)
        .routing("paritySplit")
        .build();
    let ctrl = MemoryController::new(params(), &cfg).unwrap();
    assert_eq!(ctrl.routing(), Routing::ParitySplit);
}

#[test]
fn routing_needing_missing_pool_is_fatal() {
    let cfg = ConfigBuilder::new()
        .in_package(2)
        .routing("externalOnly")
        .build();
    assert!(matches!(
        MemoryController::new(params(), &cfg),
        Err(ControllerError::Config {
            source: ConfigError::RoutingNeedsPool { .. },
            ..
        })
    ));
}

#[test]
fn bad_device_option_is_fatal() {
    let cfg = ConfigBuilder::new()
        .external()
        .set("sys.mem.ext_dram.addrMapping", serde_json::json!("rank:bank"))
        .build();
    assert!(MemoryController::new(params(), &cfg).is_err());
}

#[test]
fn with_pools_requires_a_pool_and_valid_line_size() {
    assert!(matches!(
        MemoryController::with_pools("x", 64, None, None, Routing::InPackageFirst),
        Err(ControllerError::Config {
            source: ConfigError::NoMemory,
            ..
        })
    ));
    let dev = MockDevice::new("d", 1);
    assert!(matches!(
        MemoryController::with_pools(
            "x",
            96,
            Some(BackendPool::single(MemoryType::Ddr, Box::new(dev))),
            None,
            Routing::InPackageFirst
        ),
        Err(ControllerError::Config {
            source: ConfigError::BadLineSize(96),
            ..
        })
    ));
}

// ══════════════════════════════════════════════════════════
// 2. Coherence and bypass
// ══════════════════════════════════════════════════════════

#[test]
fn clean_eviction_bypasses_everything() {
    let (ctrl, ext, mc) = mocked(4, 64, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::WritebackClean, LineAddr::new(7), 1234);
    req.state = MesiState::Shared;
    assert_eq!(ctrl.access(&mut req), 1234);
    assert_eq!(req.cycle, 1234);
    assert_eq!(req.state, MesiState::Invalid);
    assert_eq!(seen(&ext) + total(&mc), 0);
    assert_eq!(ctrl.footprint().total_misses, 0);
}

#[test]
fn dirty_eviction_reaches_exactly_one_device() {
    let (ctrl, ext, mc) = mocked(4, 64, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::WritebackDirty, LineAddr::new(7), 50);
    assert_eq!(ctrl.access(&mut req), 50 + LATENCY);
    assert_eq!(req.state, MesiState::Invalid);
    assert_eq!(seen(&ext) + total(&mc), 1);
    assert_eq!(ctrl.footprint().total_misses, 1);
}

#[test]
fn gets_grants_exclusive() {
    let (ctrl, _, _) = mocked(1, 64, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(0), 0);
    let _ = ctrl.access(&mut req);
    assert_eq!(req.state, MesiState::Exclusive);
}

#[test]
fn gets_noexcl_grants_shared() {
    let (ctrl, _, _) = mocked(1, 64, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(0), 0)
        .with_flags(ReqFlags::NOEXCL);
    let _ = ctrl.access(&mut req);
    assert_eq!(req.state, MesiState::Shared);
}

#[test]
fn getx_grants_modified() {
    let (ctrl, _, _) = mocked(1, 64, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::ReadExclusive, LineAddr::new(0), 0);
    let _ = ctrl.access(&mut req);
    assert_eq!(req.state, MesiState::Modified);
}

#[test]
fn decode_rejects_unknown_types() {
    let (ctrl, _) = external_only();
    assert!(matches!(
        ctrl.decode(9, 0, 0, 0),
        Err(ControllerError::Protocol {
            source: ProtocolError::UnknownRequestType(9),
            ..
        })
    ));
    let req = ctrl.decode(1, 5, 0, 3).unwrap();
    assert_eq!(req.kind, AccessType::ReadExclusive);
}

// ══════════════════════════════════════════════════════════
// 3. Routing and interleaving
// ══════════════════════════════════════════════════════════

#[test]
fn interleaved_dispatch_rewrites_to_local_line() {
    let (ctrl, ext, mc) = mocked(4, 64, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(138), 0);
    let _ = ctrl.access(&mut req);

    assert_eq!(seen(&ext), 0);
    let counts: Vec<_> = mc.iter().map(seen).collect();
    assert_eq!(counts, vec![0, 0, 1, 0]);
    let routed = mc[2].lock().unwrap()[0];
    assert_eq!(routed.line_addr, LineAddr::new(10));
    // The caller's request keeps its global address.
    assert_eq!(req.line_addr, LineAddr::new(138));
}

#[test]
fn line_10_goes_to_device_0() {
    let (ctrl, _, mc) = mocked(4, 64, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(10), 0);
    let _ = ctrl.access(&mut req);
    assert_eq!(mc[0].lock().unwrap()[0].line_addr, LineAddr::new(10));
}

#[test]
fn routed_request_keeps_metadata() {
    let (ctrl, _, mc) = mocked(2, 1, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(3), 77)
        .with_flags(ReqFlags::PREFETCH)
        .with_src(5);
    let _ = ctrl.access(&mut req);
    let routed = mc[1].lock().unwrap()[0];
    assert_eq!(routed.kind, AccessType::ReadShared);
    assert_eq!(routed.cycle, 77);
    assert_eq!(routed.src_id, 5);
    assert!(routed.is(ReqFlags::PREFETCH));
    assert_eq!(routed.line_addr, LineAddr::new(1));
}

#[test]
fn external_pool_uses_identity_mapping() {
    let (ctrl, log) = external_only();
    let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(0xabcdef), 0);
    let _ = ctrl.access(&mut req);
    assert_eq!(log.lock().unwrap()[0].line_addr, LineAddr::new(0xabcdef));
}

#[test]
fn external_only_routing_skips_in_package() {
    let (ctrl, ext, mc) = mocked(4, 64, Routing::ExternalOnly);
    for line in 0..16 {
        let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(line), 0);
        let _ = ctrl.access(&mut req);
    }
    assert_eq!(seen(&ext), 16);
    assert_eq!(total(&mc), 0);
}

#[test]
fn parity_split_routing() {
    let (ctrl, ext, mc) = mocked(2, 64, Routing::ParitySplit);
    for line in 0..10 {
        let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(line), 0);
        let _ = ctrl.access(&mut req);
    }
    assert_eq!(seen(&ext), 5);
    assert_eq!(total(&mc), 5);
}

#[test]
fn route_reports_without_side_effects() {
    let (ctrl, ext, mc) = mocked(4, 64, Routing::InPackageFirst);
    assert_eq!(
        ctrl.route(LineAddr::new(138)),
        Route {
            pool: PoolId::InPackage,
            device: 2,
            local: LineAddr::new(10)
        }
    );
    assert_eq!(seen(&ext) + total(&mc), 0);
    assert_eq!(ctrl.footprint().total_misses, 0);
}

// ══════════════════════════════════════════════════════════
// 4. Bookkeeping and stats
// ══════════════════════════════════════════════════════════

#[test]
fn bookkeeping_counts_misses_and_pages() {
    let (ctrl, _) = external_only();
    for line in [0, 0, 1, 64, 64, 200] {
        let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(line), 0);
        let _ = ctrl.access(&mut req);
    }
    let mut puts = MemRequest::new(AccessType::WritebackClean, LineAddr::new(999), 0);
    let _ = ctrl.access(&mut puts);

    let fp = ctrl.footprint();
    assert_eq!(fp.total_misses, 6);
    assert_eq!(fp.compulsory_misses, 4);
    assert_eq!(fp.pages_touched, 3);
}

#[test]
fn stats_layout() {
    let (ctrl, _, _) = mocked(2, 64, Routing::InPackageFirst);
    let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(1), 0);
    let _ = ctrl.access(&mut req);

    let stats = ctrl.stats();
    assert_eq!(stats.get("memctrl.mem-0.llcTotalMisses"), Some(1));
    assert_eq!(stats.get("memctrl.mem-0.llcCompulsoryMisses"), Some(1));
    assert_eq!(stats.get("memctrl.mem-0.totalPages"), Some(1));
    let dram = stats.group("DRAM").unwrap();
    let names: Vec<_> = dram.children.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["mem-0-ext", "mem-0-mc-0", "mem-0-mc-1"]);
    assert_eq!(stats.get("DRAM.mem-0-mc-0.accesses"), Some(1));
}

#[test]
fn stats_from_real_devices() {
    let cfg = ConfigBuilder::new().external().in_package(2).build();
    let ctrl = MemoryController::new(params(), &cfg).unwrap();
    let mut req = MemRequest::new(AccessType::ReadShared, LineAddr::new(64), 0);
    let done = ctrl.access(&mut req);
    assert!(done > 0);
    assert_eq!(req.cycle, done);

    let stats = ctrl.stats();
    assert_eq!(stats.get("DRAM.mem-0-mc-1.rd"), Some(1));
    assert_eq!(stats.get("DRAM.mem-0-mc-0.rd"), Some(0));
    assert_eq!(stats.get("DRAM.mem-0-ext.rd"), Some(0));
}

// ══════════════════════════════════════════════════════════
// 5. Concurrency
// ══════════════════════════════════════════════════════════

#[test]
fn concurrent_requesters_lose_no_updates() {
    let (ctrl, ext, mc) = mocked(4, 8, Routing::InPackageFirst);
    let threads = 8u64;
    let per_thread = 250u64;

    thread::scope(|s| {
        for t in 0..threads {
            let ctrl = &ctrl;
            let _ = s.spawn(move || {
                for i in 0..per_thread {
                    let kind = if i % 5 == 4 {
                        AccessType::WritebackClean
                    } else {
                        AccessType::ReadShared
                    };
                    let mut req = MemRequest::new(kind, LineAddr::new(t * per_thread + i), i)
                        .with_src(t as u32);
                    let _ = ctrl.access(&mut req);
                }
            });
        }
    });

    let dispatched = threads * per_thread * 4 / 5;
    assert_eq!(seen(&ext), 0);
    assert_eq!(total(&mc) as u64, dispatched);
    let fp = ctrl.footprint();
    assert_eq!(fp.total_misses, dispatched);
    assert_eq!(fp.compulsory_misses, dispatched);
}
