//! Statistics registration and reporting.
//!
//! This module carries the counters the controller exports for post-run analysis. It provides:
//! 1. **Counters:** `Counter`, an atomic monotonically increasing value.
//! 2. **Registration:** `StatsSink`, the hierarchical interface components report into.
//! 3. **Collection:** `StatsTree`, a serializable sink with dotted-path lookup and a text report.
//! 4. **Footprint:** `FootprintReport`, the derived memory-footprint summary.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::common::PAGE_SIZE;

/// Monotonically increasing event counter.
///
/// Safe to bump and read from any thread; readers see a value that is at least as large as
/// any value previously observed.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a counter at zero.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Adds one.
    #[inline]
    pub fn inc(&self) {
        let _ = self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `n`.
    #[inline]
    pub fn add(&self, n: u64) {
        let _ = self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the current value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Hierarchical stats registration sink.
///
/// Components open a group, report counters into it, and close it. Groups nest.
pub trait StatsSink {
    /// Opens a child group of the current group.
    fn enter(&mut self, name: &str, desc: &str);

    /// Reports one counter into the current group.
    fn counter(&mut self, name: &str, desc: &str, value: u64);

    /// Closes the current group.
    fn leave(&mut self);
}

/// A single named counter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatValue {
    /// Counter name.
    pub name: String,
    /// Description.
    pub desc: String,
    /// Value at collection time.
    pub value: u64,
}

/// A named group of counters and child groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatGroup {
    /// Group name.
    pub name: String,
    /// Description.
    pub desc: String,
    /// Counters in registration order.
    pub counters: Vec<StatValue>,
    /// Child groups in registration order.
    pub children: Vec<StatGroup>,
}

impl StatGroup {
    fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|g| g.name == name)
    }
}

/// Collecting stats sink.
///
/// # Examples
///
/// ```
/// use mcsim_core::stats::{StatsSink, StatsTree};
///
/// let mut tree = StatsTree::new("root");
/// tree.enter("memctrl", "Memory controller stats");
/// tree.counter("llcTotalMisses", "Total LLC Misses", 3);
/// tree.leave();
/// assert_eq!(tree.get("memctrl.llcTotalMisses"), Some(3));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct StatsTree {
    root: StatGroup,
    #[serde(skip)]
    cursor: Vec<usize>,
}

impl StatsTree {
    /// Creates an empty tree with the given root group name.
    pub fn new(name: &str) -> Self {
        Self {
            root: StatGroup {
                name: name.to_owned(),
                ..StatGroup::default()
            },
            cursor: Vec::new(),
        }
    }

    /// Returns the root group.
    pub const fn root(&self) -> &StatGroup {
        &self.root
    }

    /// Looks up a counter by dotted path relative to the root, e.g. `DRAM.mc-0.rd`.
    pub fn get(&self, path: &str) -> Option<u64> {
        let (groups, leaf) = path.rsplit_once('.').map_or(("", path), |(g, l)| (g, l));
        let group = groups
            .split('.')
            .filter(|p| !p.is_empty())
            .try_fold(&self.root, |g, part| g.child(part))?;
        group
            .counters
            .iter()
            .find(|c| c.name == leaf)
            .map(|c| c.value)
    }

    /// Looks up a group by dotted path relative to the root.
    pub fn group(&self, path: &str) -> Option<&StatGroup> {
        path.split('.')
            .filter(|p| !p.is_empty())
            .try_fold(&self.root, |g, part| g.child(part))
    }

    /// Serializes the tree as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.root)
    }

    /// Renders the tree as an indented text report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("==========================================================\n");
        out.push_str("MEMORY CONTROLLER STATISTICS\n");
        out.push_str("==========================================================\n");
        for child in &self.root.children {
            Self::render_group(child, 0, &mut out);
        }
        for c in &self.root.counters {
            Self::render_counter(c, 0, &mut out);
        }
        out.push_str("==========================================================\n");
        out
    }

    fn render_group(group: &StatGroup, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        out.push_str(&format!("{pad}{}  # {}\n", group.name, group.desc));
        for c in &group.counters {
            Self::render_counter(c, depth + 1, out);
        }
        for child in &group.children {
            Self::render_group(child, depth + 1, out);
        }
    }

    fn render_counter(c: &StatValue, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        out.push_str(&format!("{pad}{:<24} {:<12} # {}\n", c.name, c.value, c.desc));
    }

    fn current(&mut self) -> &mut StatGroup {
        let mut group = &mut self.root;
        for &idx in &self.cursor {
            group = &mut group.children[idx];
        }
        group
    }
}

impl StatsSink for StatsTree {
    fn enter(&mut self, name: &str, desc: &str) {
        let group = self.current();
        let idx = match group.children.iter().position(|g| g.name == name) {
            Some(idx) => idx,
            None => {
                group.children.push(StatGroup {
                    name: name.to_owned(),
                    desc: desc.to_owned(),
                    ..StatGroup::default()
                });
                group.children.len() - 1
            }
        };
        self.cursor.push(idx);
    }

    fn counter(&mut self, name: &str, desc: &str, value: u64) {
        self.current().counters.push(StatValue {
            name: name.to_owned(),
            desc: desc.to_owned(),
            value,
        });
    }

    fn leave(&mut self) {
        let _ = self.cursor.pop();
    }
}

/// Memory-footprint summary derived from the bookkeeping counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FootprintReport {
    /// Requests that reached memory.
    pub total_misses: u64,
    /// First-touch line misses.
    pub compulsory_misses: u64,
    /// Distinct 4KB pages touched.
    pub pages_touched: u64,
}

impl FootprintReport {
    /// Footprint in bytes, counting every touched page in full.
    pub const fn footprint_bytes(&self) -> u64 {
        self.pages_touched * PAGE_SIZE
    }

    /// Fraction of misses that were compulsory, or 0 with no misses.
    pub fn compulsory_ratio(&self) -> f64 {
        if self.total_misses == 0 {
            0.0
        } else {
            self.compulsory_misses as f64 / self.total_misses as f64
        }
    }
}
