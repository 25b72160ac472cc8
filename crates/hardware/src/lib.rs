//! Multi-channel memory controller library.
//!
//! This crate models the memory controller that sits behind a last-level cache:
//! 1. **Controller:** Coherence resolution, miss bookkeeping, pool routing and interleaving.
//! 2. **DRAM:** A DDR device model with bank state, timing tables and a bounded queue.
//! 3. **Configuration:** Dotted-key lookup over a JSON tree with typed defaults.
//! 4. **Statistics:** Hierarchical counter groups rendered as text or JSON.
//! 5. **Simulation:** A multi-threaded synthetic traffic driver.

/// Common types (addresses, constants, errors).
pub mod common;
/// Configuration lookup, defaults and device options.
pub mod config;
/// DRAM device models.
pub mod dram;
/// The memory controller and its components.
pub mod mc;
/// Memory requests and coherence states.
pub mod request;
/// Synthetic traffic generation.
pub mod sim;
/// Statistics collection and reporting.
pub mod stats;

/// JSON-backed configuration; construct with `ConfigTree::from_file` or `from_json_str`.
pub use crate::config::ConfigTree;
/// The controller; construct with `MemoryController::new`.
pub use crate::mc::{ControllerParams, MemoryController};
/// A single cache-line request.
pub use crate::request::{AccessType, MemRequest, MesiState, ReqFlags};
/// Collected counters.
pub use crate::stats::StatsTree;
