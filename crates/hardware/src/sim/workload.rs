//! Synthetic traffic driver.
//!
//! Issues a request stream against one controller from several requester threads at once.
//! It provides:
//! 1. **Patterns:** Sequential, strided, and a looping sweep over a fixed buffer.
//! 2. **Mix:** A deterministic share of writebacks, alternating dirty and clean.
//! 3. **Timing:** Each requester issues its next request a fixed gap after the previous one
//!    completes.
//! 4. **Summary:** Request, writeback and bypass counts plus the last completion cycle.

use std::fmt;
use std::str::FromStr;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::{ConfigError, LineAddr};
use crate::mc::MemoryController;
use crate::mc::coherence;
use crate::request::{AccessType, MemRequest, ReqFlags};

/// Address pattern of a request stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pattern {
    /// Consecutive lines; requester `t` starts where requester `t - 1` ends.
    Sequential,
    /// Consecutive slots spaced `stride` lines apart.
    Strided {
        /// Distance between touched lines.
        stride: u64,
    },
    /// Repeated passes over a buffer of `lines` lines.
    Sweep {
        /// Buffer length in lines.
        lines: u64,
    },
}

impl Pattern {
    /// Line touched by the `index`-th request of `requester`.
    ///
    /// # Arguments
    ///
    /// * `requester` - Requester index.
    /// * `index` - Request index within the requester's stream.
    /// * `per_requester` - Stream length of every requester.
    pub const fn line(&self, requester: u64, index: u64, per_requester: u64) -> LineAddr {
        let slot = requester.wrapping_mul(per_requester).wrapping_add(index);
        match *self {
            Self::Sequential => LineAddr::new(slot),
            Self::Strided { stride } => LineAddr::new(slot.wrapping_mul(stride)),
            Self::Sweep { lines } => LineAddr::new(slot % lines),
        }
    }

    /// Short name used on the command line.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Strided { .. } => "strided",
            Self::Sweep { .. } => "sweep",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Strided { stride } => write!(f, "strided({stride})"),
            Self::Sweep { lines } => write!(f, "sweep({lines})"),
        }
    }
}

/// Default buffer length for `sweep` when parsed by name: 4 MiB of 64-byte lines.
pub const DEFAULT_SWEEP_LINES: u64 = (4 << 20) / 64;

/// Default distance for `strided` when parsed by name.
pub const DEFAULT_STRIDE: u64 = 16;

impl FromStr for Pattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "strided" => Ok(Self::Strided {
                stride: DEFAULT_STRIDE,
            }),
            "sweep" => Ok(Self::Sweep {
                lines: DEFAULT_SWEEP_LINES,
            }),
            _ => Err(ConfigError::BadWorkload {
                field: "pattern",
                reason: "expected sequential, strided or sweep",
            }),
        }
    }
}

/// A synthetic workload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    /// Address pattern.
    pub pattern: Pattern,
    /// Number of concurrent requesters.
    pub threads: usize,
    /// Requests issued by each requester.
    pub requests_per_thread: u64,
    /// Fraction of requests that are writebacks, in `[0, 1]`.
    pub writeback_ratio: f64,
    /// Cycles between a completion and the requester's next issue.
    pub issue_gap: u64,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            pattern: Pattern::Sequential,
            threads: 1,
            requests_per_thread: 1024,
            writeback_ratio: 0.0,
            issue_gap: 1,
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Requesters that took part.
    pub threads: usize,
    /// Requests issued.
    pub issued: u64,
    /// Read requests issued.
    pub reads: u64,
    /// Writebacks issued, clean and dirty.
    pub writebacks: u64,
    /// Clean writebacks answered without touching a device.
    pub bypassed: u64,
    /// Latest completion cycle over all requesters.
    pub last_completion: u64,
}

impl RunSummary {
    fn merge(self, other: Self) -> Self {
        Self {
            threads: self.threads + other.threads,
            issued: self.issued + other.issued,
            reads: self.reads + other.reads,
            writebacks: self.writebacks + other.writebacks,
            bypassed: self.bypassed + other.bypassed,
            last_completion: self.last_completion.max(other.last_completion),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "threads          {}", self.threads)?;
        writeln!(f, "issued           {}", self.issued)?;
        writeln!(f, "reads            {}", self.reads)?;
        writeln!(f, "writebacks       {}", self.writebacks)?;
        writeln!(f, "bypassed         {}", self.bypassed)?;
        write!(f, "last completion  {}", self.last_completion)
    }
}

impl Workload {
    /// Checks that the workload can run.
    ///
    /// # Errors
    ///
    /// `ConfigError::BadWorkload` for zero threads, a ratio outside `[0, 1]`, a zero stride
    /// or an empty sweep buffer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |field, reason| Err(ConfigError::BadWorkload { field, reason });
        if self.threads == 0 {
            return bad("threads", "must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.writeback_ratio) {
            return bad("writeback_ratio", "must be between 0 and 1");
        }
        match self.pattern {
            Pattern::Strided { stride: 0 } => bad("stride", "must be at least 1"),
            Pattern::Sweep { lines: 0 } => bad("sweep lines", "must be at least 1"),
            _ => Ok(()),
        }
    }

    /// Request type of the `index`-th request of a stream.
    ///
    /// Writebacks are spread evenly: request `i` is a writeback when `floor((i + 1) * r)`
    /// exceeds `floor(i * r)`. Writebacks alternate dirty, clean, dirty, ...
    pub fn kind_at(&self, index: u64) -> AccessType {
        let r = self.writeback_ratio;
        let before = (index as f64 * r).floor();
        let after = ((index + 1) as f64 * r).floor();
        if after > before {
            if (before as u64) % 2 == 0 {
                AccessType::WritebackDirty
            } else {
                AccessType::WritebackClean
            }
        } else {
            AccessType::ReadShared
        }
    }

    /// Runs the workload to completion.
    ///
    /// Each requester runs on its own scoped thread and shares `ctrl`.
    ///
    /// # Errors
    ///
    /// Whatever `validate` rejects.
    pub fn run(&self, ctrl: &MemoryController) -> Result<RunSummary, ConfigError> {
        self.validate()?;
        info!(
            controller = ctrl.name(),
            pattern = %self.pattern,
            threads = self.threads,
            requests = self.requests_per_thread,
            "starting workload"
        );

        let summary = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.threads)
                .map(|t| scope.spawn(move || self.run_requester(ctrl, t)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .fold(RunSummary::default(), RunSummary::merge)
        });

        info!(
            controller = ctrl.name(),
            issued = summary.issued,
            bypassed = summary.bypassed,
            last_completion = summary.last_completion,
            "workload finished"
        );
        Ok(summary)
    }

    fn run_requester(&self, ctrl: &MemoryController, requester: usize) -> RunSummary {
        let mut summary = RunSummary {
            threads: 1,
            ..RunSummary::default()
        };
        let mut clock = 0_u64;

        for index in 0..self.requests_per_thread {
            let kind = self.kind_at(index);
            let line = self
                .pattern
                .line(requester as u64, index, self.requests_per_thread);
            let mut req = MemRequest::new(kind, line, clock).with_src(requester as u32);

            if coherence::resolve(kind, ReqFlags::NONE).bypass {
                summary.bypassed += 1;
            }
            if kind.is_writeback() {
                summary.writebacks += 1;
            } else {
                summary.reads += 1;
            }

            let done = ctrl.access(&mut req);
            summary.issued += 1;
            summary.last_completion = summary.last_completion.max(done);
            clock = done + self.issue_gap;
        }

        debug!(
            requester,
            issued = summary.issued,
            last_completion = summary.last_completion,
            "requester finished"
        );
        summary
    }
}
