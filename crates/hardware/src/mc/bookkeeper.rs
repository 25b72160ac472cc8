//! Miss and footprint bookkeeping.
//!
//! Tracks every distinct line and page that reaches memory. The visit maps only grow; their
//! purpose is exhaustive footprint accounting over the whole run, not caching.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::common::{LineAddr, PageAddr};
use crate::stats::{Counter, FootprintReport, StatsSink};

/// Whether a recorded access was the first to its line and to its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    /// First access to this line.
    pub first_line: bool,
    /// First access to this page.
    pub first_page: bool,
}

#[derive(Debug, Default)]
struct VisitMaps {
    lines: HashMap<LineAddr, u64>,
    pages: HashMap<PageAddr, u64>,
}

/// Line and page visit accounting.
///
/// The maps sit behind their own lock, separate from the dispatch lock, so requesters
/// running on parallel threads never lose updates and never wait on a backend to count.
/// The three counters are atomics and can be read without locking.
#[derive(Debug)]
pub struct AccessBookkeeper {
    lines_per_page: u64,
    visits: Mutex<VisitMaps>,
    total_misses: Counter,
    compulsory_misses: Counter,
    pages_touched: Counter,
}

impl AccessBookkeeper {
    /// Creates a bookkeeper for the given page geometry.
    ///
    /// # Arguments
    ///
    /// * `lines_per_page` - Lines per 4KB page; must be non-zero.
    pub fn new(lines_per_page: u64) -> Self {
        Self {
            lines_per_page,
            visits: Mutex::new(VisitMaps::default()),
            total_misses: Counter::new(),
            compulsory_misses: Counter::new(),
            pages_touched: Counter::new(),
        }
    }

    /// Records one access that reached memory.
    ///
    /// Bumps the total-miss counter unconditionally, the compulsory-miss counter on the first
    /// visit to `line`, and the pages-touched counter on the first visit to its page.
    pub fn record(&self, line: LineAddr) -> Visit {
        self.total_misses.inc();
        let page = line.page(self.lines_per_page);

        let mut maps = self.visits.lock().unwrap_or_else(PoisonError::into_inner);
        let first_line = bump(&mut maps.lines, line);
        let first_page = bump(&mut maps.pages, page);
        drop(maps);

        if first_line {
            self.compulsory_misses.inc();
        }
        if first_page {
            self.pages_touched.inc();
        }
        Visit {
            first_line,
            first_page,
        }
    }

    /// Lines per page used to derive page addresses.
    pub const fn lines_per_page(&self) -> u64 {
        self.lines_per_page
    }

    /// Number of recorded accesses.
    pub fn total_misses(&self) -> u64 {
        self.total_misses.get()
    }

    /// Number of distinct lines seen.
    pub fn compulsory_misses(&self) -> u64 {
        self.compulsory_misses.get()
    }

    /// Number of distinct pages seen.
    pub fn pages_touched(&self) -> u64 {
        self.pages_touched.get()
    }

    /// Visit count of one line (0 if never seen).
    pub fn line_visits(&self, line: LineAddr) -> u64 {
        let maps = self.visits.lock().unwrap_or_else(PoisonError::into_inner);
        maps.lines.get(&line).copied().unwrap_or(0)
    }

    /// Visit count of one page (0 if never seen).
    pub fn page_visits(&self, page: PageAddr) -> u64 {
        let maps = self.visits.lock().unwrap_or_else(PoisonError::into_inner);
        maps.pages.get(&page).copied().unwrap_or(0)
    }

    /// Snapshot of the three counters.
    pub fn footprint(&self) -> FootprintReport {
        FootprintReport {
            total_misses: self.total_misses(),
            compulsory_misses: self.compulsory_misses(),
            pages_touched: self.pages_touched(),
        }
    }

    /// Reports the three counters into the current group of `sink`.
    pub fn report_stats(&self, sink: &mut dyn StatsSink) {
        sink.counter(
            "totalPages",
            "Number of 4KB Pages Touched by the Application",
            self.pages_touched(),
        );
        sink.counter(
            "llcCompulsoryMisses",
            "Compulsory LLC Misses",
            self.compulsory_misses(),
        );
        sink.counter("llcTotalMisses", "Total LLC Misses", self.total_misses());
    }
}

/// Increments the visit count of `key`, returning `true` on the first visit.
fn bump<K: std::hash::Hash + Eq>(map: &mut HashMap<K, u64>, key: K) -> bool {
    let count = map.entry(key).or_insert(0);
    *count += 1;
    *count == 1
}
