//! DDR channel model.
//!
//! Row-buffer-aware timing for one channel. It models:
//! 1. **Row buffers:** Per-bank open row; hit = CL, empty = tRCD + CL, conflict = tRP + tRCD + CL.
//! 2. **Page policy:** Closed-page precharges after every access; open-page keeps the row until
//!    `max_row_hits` consecutive hits have been served.
//! 3. **Queueing:** At most `queue_depth` requests in flight; a full queue delays the arrival
//!    until the oldest request completes.
//! 4. **Writes:** With deferred writes a dirty writeback is acknowledged after the controller
//!    latency while still occupying its bank.
//!
//! Responses never go backwards in time for a given device.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::debug;

use super::mapping::{AddrMapping, Geometry};
use super::tech::DdrTiming;
use super::{DeviceContext, MemoryDevice};
use crate::common::ConfigError;
use crate::common::constants::DDR_BURST_CYCLES;
use crate::config::DramConfig;
use crate::request::{AccessType, MemRequest};
use crate::stats::StatsSink;

#[derive(Debug, Clone, Copy, Default)]
struct Bank {
    open_row: Option<u64>,
    row_hits: u32,
    ready_at: u64,
}

/// Per-device counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdrStats {
    /// Reads serviced (GETS/GETX).
    pub reads: u64,
    /// Writes serviced (PUTX).
    pub writes: u64,
    /// Accesses that found their row open.
    pub row_hits: u64,
    /// Accesses that had to activate a row.
    pub row_misses: u64,
    /// Sum of read latencies in system cycles.
    pub read_latency: u64,
    /// Arrivals delayed by a full request queue.
    pub queue_stalls: u64,
}

/// One DDR channel.
#[derive(Debug)]
pub struct DdrMemory {
    name: String,
    domain: u32,
    timing: &'static DdrTiming,
    mapping: AddrMapping,
    geometry: Geometry,
    frequency_mhz: u32,
    controller_latency: u64,
    queue_depth: usize,
    max_row_hits: u32,
    defer_writes: bool,
    closed_page: bool,
    banks: Vec<Bank>,
    inflight: BinaryHeap<Reverse<u64>>,
    last_response: u64,
    stats: DdrStats,
}

impl DdrMemory {
    /// Builds a channel from validated options.
    ///
    /// # Arguments
    ///
    /// * `name` - Device name.
    /// * `cfg` - Device options.
    /// * `ctx` - Line size, frequency and clock domain.
    ///
    /// # Errors
    ///
    /// Unknown technology, malformed address mapping, or invalid geometry.
    pub fn new(name: String, cfg: &DramConfig, ctx: &DeviceContext) -> Result<Self, ConfigError> {
        cfg.validate(ctx.line_size)?;
        if ctx.frequency_mhz == 0 {
            return Err(ConfigError::BadGeometry {
                key: "frequency".to_owned(),
                value: 0,
                reason: "must be at least 1 MHz",
            });
        }
        let timing = DdrTiming::lookup(&cfg.tech)?;
        let mapping = AddrMapping::parse(&cfg.addr_mapping)?;
        let geometry = Geometry {
            ranks: cfg.ranks_per_channel,
            banks: cfg.banks_per_rank,
            cols: cfg.page_size / ctx.line_size,
        };

        debug!(
            device = %name,
            tech = timing.name,
            ranks = geometry.ranks,
            banks = geometry.banks,
            cols = geometry.cols,
            mapping = %mapping,
            closed_page = cfg.closed_page,
            "built DDR device"
        );

        Ok(Self {
            name,
            domain: ctx.domain,
            timing,
            mapping,
            geometry,
            frequency_mhz: ctx.frequency_mhz,
            controller_latency: u64::from(cfg.controller_latency),
            queue_depth: cfg.queue_depth as usize,
            max_row_hits: cfg.max_row_hits,
            defer_writes: cfg.defer_writes,
            closed_page: cfg.closed_page,
            banks: vec![Bank::default(); geometry.total_banks()],
            inflight: BinaryHeap::with_capacity(cfg.queue_depth as usize),
            last_response: 0,
            stats: DdrStats::default(),
        })
    }

    /// Clock domain of this device.
    pub const fn domain(&self) -> u32 {
        self.domain
    }

    /// Timing parameter set in use.
    pub const fn timing(&self) -> &'static DdrTiming {
        self.timing
    }

    /// Geometry in lines.
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Counter snapshot.
    pub const fn stats(&self) -> DdrStats {
        self.stats
    }

    fn sys(&self, mem_cycles: u32) -> u64 {
        self.timing
            .to_sys_cycles(u64::from(mem_cycles), self.frequency_mhz)
    }

    /// Admits a request into the queue, returning the earliest cycle it may start.
    fn admit(&mut self, arrival: u64) -> u64 {
        while self.inflight.peek().is_some_and(|&Reverse(done)| done <= arrival) {
            let _ = self.inflight.pop();
        }
        let mut start = arrival + self.controller_latency;
        if self.inflight.len() >= self.queue_depth {
            if let Some(Reverse(oldest)) = self.inflight.pop() {
                start = start.max(oldest);
                self.stats.queue_stalls += 1;
            }
        }
        start
    }
}

impl MemoryDevice for DdrMemory {
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&mut self, req: &MemRequest) -> u64 {
        let arrival = req.cycle;
        let is_write = req.kind == AccessType::WritebackDirty;
        let mut start = self.admit(arrival);

        let coord = self.mapping.decode(req.line_addr, &self.geometry);
        let idx = (coord.rank * self.geometry.banks + coord.bank) as usize;
        let t = *self.timing;

        let bank = self.banks[idx];
        start = start.max(bank.ready_at);
        let (row_cycles, hit) = match bank.open_row {
            Some(row) if row == coord.row => (t.cl, true),
            Some(_) => (t.rp + t.rcd + t.cl, false),
            None => (t.rcd + t.cl, false),
        };
        let done = start + self.sys(row_cycles + DDR_BURST_CYCLES);
        let precharge = self.sys(t.rp);

        let bank = &mut self.banks[idx];
        bank.row_hits = if hit { bank.row_hits + 1 } else { 0 };
        if self.closed_page || bank.row_hits >= self.max_row_hits {
            bank.open_row = None;
            bank.row_hits = 0;
            bank.ready_at = done + precharge;
        } else {
            bank.open_row = Some(coord.row);
            bank.ready_at = done;
        }
        self.inflight.push(Reverse(done));

        let response = if is_write && self.defer_writes {
            arrival + self.controller_latency
        } else {
            done
        };
        let response = response.max(self.last_response);
        self.last_response = response;

        if hit {
            self.stats.row_hits += 1;
        } else {
            self.stats.row_misses += 1;
        }
        if is_write {
            self.stats.writes += 1;
        } else {
            self.stats.reads += 1;
            self.stats.read_latency += response - arrival;
        }
        response
    }

    fn report_stats(&self, sink: &mut dyn StatsSink) {
        sink.enter(&self.name, "DDR channel stats");
        sink.counter("rd", "Read requests", self.stats.reads);
        sink.counter("wr", "Write requests", self.stats.writes);
        sink.counter("rowHits", "Row buffer hits", self.stats.row_hits);
        sink.counter("rowMisses", "Row buffer misses", self.stats.row_misses);
        sink.counter("rdLat", "Total read latency (cycles)", self.stats.read_latency);
        sink.counter("queueStalls", "Arrivals delayed by a full queue", self.stats.queue_stalls);
        sink.leave();
    }
}
