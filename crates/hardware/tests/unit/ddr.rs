//! DDR Channel Tests.
//!
//! Verifies row-buffer timing, page policy, queueing and deferred writes. All tests run
//! DDR3-1333-CL10 at 2 GHz, where one memory cycle is three system cycles:
//! hit = (CL + burst) * 3 = 42, empty = (RCD + CL + burst) * 3 = 72,
//! conflict = (RP + RCD + CL + burst) * 3 = 102, precharge = 30.

use crate::common::harness::ctx;
use mcsim_core::common::{ConfigError, LineAddr};
use mcsim_core::config::DramConfig;
use mcsim_core::dram::{DdrMemory, DeviceContext, MemoryDevice};
use mcsim_core::stats::StatsTree;
use mcsim_core::{AccessType, MemRequest};

const CTRL: u64 = 10;
const HIT: u64 = 42;
const EMPTY: u64 = 72;
const CONFLICT: u64 = 102;
const PRECHARGE: u64 = 30;
/// Lines between two rows of the same bank with the default geometry.
const ROW_STRIDE: u64 = 8 * 128 * 4;

fn device(tweak: impl FnOnce(&mut DramConfig)) -> DdrMemory {
    let mut cfg = DramConfig::default();
    tweak(&mut cfg);
    DdrMemory::new("ddr".to_owned(), &cfg, &ctx()).unwrap()
}

fn open_page() -> DdrMemory {
    device(|c| c.closed_page = false)
}

fn read(dev: &mut DdrMemory, line: u64, cycle: u64) -> u64 {
    dev.access(&MemRequest::new(
        AccessType::ReadShared,
        LineAddr::new(line),
        cycle,
    ))
}

// ══════════════════════════════════════════════════════════
// 1. Construction
// ══════════════════════════════════════════════════════════

#[test]
fn default_geometry() {
    let dev = device(|_| {});
    let g = dev.geometry();
    assert_eq!((g.ranks, g.banks, g.cols), (4, 8, 128));
    assert_eq!(dev.timing().name, "DDR3-1333-CL10");
    assert_eq!(dev.name(), "ddr");
}

#[test]
fn unknown_tech_rejected() {
    let mut cfg = DramConfig::default();
    cfg.tech = "LPDDR5".to_owned();
    assert!(matches!(
        DdrMemory::new("ddr".to_owned(), &cfg, &ctx()),
        Err(ConfigError::UnknownTech(_))
    ));
}

#[test]
fn zero_frequency_rejected() {
    let bad = DeviceContext {
        frequency_mhz: 0,
        ..ctx()
    };
    assert!(DdrMemory::new("ddr".to_owned(), &DramConfig::default(), &bad).is_err());
}

#[test]
fn page_size_must_hold_whole_lines() {
    let mut cfg = DramConfig::default();
    cfg.page_size = 100;
    assert!(matches!(
        DdrMemory::new("ddr".to_owned(), &cfg, &ctx()),
        Err(ConfigError::BadGeometry { .. })
    ));
}

// ══════════════════════════════════════════════════════════
// 2. Row buffer timing
// ══════════════════════════════════════════════════════════

#[test]
fn cold_read_activates_row() {
    let mut dev = device(|_| {});
    assert_eq!(read(&mut dev, 0, 0), CTRL + EMPTY);
    assert_eq!(dev.stats().row_misses, 1);
}

#[test]
fn open_page_row_hit() {
    let mut dev = open_page();
    assert_eq!(read(&mut dev, 0, 0), CTRL + EMPTY);
    // Line 8 is column 1 of the same row and bank.
    assert_eq!(read(&mut dev, 8, 100), 100 + CTRL + HIT);
    assert_eq!(dev.stats().row_hits, 1);
}

#[test]
fn open_page_row_conflict() {
    let mut dev = open_page();
    let _ = read(&mut dev, 0, 0);
    assert_eq!(read(&mut dev, ROW_STRIDE, 100), 100 + CTRL + CONFLICT);
    assert_eq!(dev.stats().row_misses, 2);
}

#[test]
fn closed_page_precharges_after_access() {
    let mut dev = device(|_| {});
    let first = read(&mut dev, 0, 0);
    // The bank is busy precharging until first + PRECHARGE; the row is no longer open.
    assert_eq!(read(&mut dev, 0, 100), first + PRECHARGE + EMPTY);
    assert_eq!(dev.stats().row_hits, 0);
}

#[test]
fn different_banks_overlap() {
    let mut dev = device(|_| {});
    let a = read(&mut dev, 0, 0);
    let b = read(&mut dev, 1, 0);
    assert_eq!(a, CTRL + EMPTY);
    assert_eq!(b, CTRL + EMPTY);
}

#[test]
fn max_row_hits_forces_precharge() {
    let mut dev = device(|c| {
        c.closed_page = false;
        c.max_row_hits = 2;
    });
    let mut t = 0;
    for _ in 0..3 {
        t = read(&mut dev, 0, t) + 1000;
    }
    // Miss, hit, hit: the second hit reached the cap and closed the row.
    assert_eq!(dev.stats().row_hits, 2);
    let _ = read(&mut dev, 0, t);
    assert_eq!(dev.stats().row_misses, 2);
}

#[test]
fn zero_max_row_hits_behaves_like_closed_page() {
    let mut dev = device(|c| {
        c.closed_page = false;
        c.max_row_hits = 0;
    });
    let _ = read(&mut dev, 0, 0);
    let _ = read(&mut dev, 0, 1000);
    assert_eq!(dev.stats().row_hits, 0);
    assert_eq!(dev.stats().row_misses, 2);
}

// ══════════════════════════════════════════════════════════
// 3. Queueing and writes
// ══════════════════════════════════════════════════════════

#[test]
fn full_queue_delays_arrival() {
    let mut dev = device(|c| c.queue_depth = 1);
    let first = read(&mut dev, 0, 0);
    let second = read(&mut dev, 1, 0);
    assert_eq!(second, first + EMPTY);
    assert_eq!(dev.stats().queue_stalls, 1);
}

#[test]
fn completed_requests_leave_the_queue() {
    let mut dev = device(|c| c.queue_depth = 1);
    let first = read(&mut dev, 0, 0);
    let _ = read(&mut dev, 1, first);
    assert_eq!(dev.stats().queue_stalls, 0);
}

#[test]
fn deferred_write_acknowledged_early() {
    let mut dev = device(|_| {});
    let req = MemRequest::new(AccessType::WritebackDirty, LineAddr::new(0), 0);
    assert_eq!(dev.access(&req), CTRL);
    assert_eq!(dev.stats().writes, 1);
    assert_eq!(dev.stats().reads, 0);
}

#[test]
fn deferred_write_still_occupies_bank() {
    let mut dev = device(|_| {});
    let _ = dev.access(&MemRequest::new(
        AccessType::WritebackDirty,
        LineAddr::new(0),
        0,
    ));
    assert_eq!(read(&mut dev, 0, 20), CTRL + EMPTY + PRECHARGE + EMPTY);
}

#[test]
fn undeferred_write_waits_for_bank() {
    let mut dev = device(|c| c.defer_writes = false);
    let req = MemRequest::new(AccessType::WritebackDirty, LineAddr::new(0), 0);
    assert_eq!(dev.access(&req), CTRL + EMPTY);
}

#[test]
fn responses_never_go_backwards() {
    let mut dev = device(|_| {});
    let slow = read(&mut dev, 0, 0);
    let _ = read(&mut dev, 0, 0);
    // A later write ack would be earlier than the previous read; it is held back.
    let ack = dev.access(&MemRequest::new(
        AccessType::WritebackDirty,
        LineAddr::new(1),
        1,
    ));
    assert!(ack >= slow);
}

#[test]
fn read_latency_accumulates() {
    let mut dev = device(|_| {});
    let _ = read(&mut dev, 0, 0);
    let _ = read(&mut dev, 1, 0);
    assert_eq!(dev.stats().read_latency, 2 * (CTRL + EMPTY));
}

#[test]
fn stats_report_layout() {
    let mut dev = device(|_| {});
    let _ = read(&mut dev, 0, 0);
    let mut tree = StatsTree::new("root");
    dev.report_stats(&mut tree);
    assert_eq!(tree.get("ddr.rd"), Some(1));
    assert_eq!(tree.get("ddr.wr"), Some(0));
    assert_eq!(tree.get("ddr.rowMisses"), Some(1));
    assert_eq!(tree.get("ddr.rdLat"), Some(CTRL + EMPTY));
    assert_eq!(tree.get("ddr.queueStalls"), Some(0));
}
