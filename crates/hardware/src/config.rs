//! Configuration system for the memory controller.
//!
//! This module defines how configuration reaches the controller. It provides:
//! 1. **Defaults:** Baseline device and controller constants.
//! 2. **Lookup:** The `ConfigLookup` trait, a read-only key/value accessor with typed defaults.
//! 3. **Tree:** `ConfigTree`, the JSON-backed lookup used by the CLI and tests.
//! 4. **Structures:** `DramConfig` (per-device options) and enums for memory type and routing.
//!
//! Keys are dotted paths such as `sys.mem.mc_dram.mc_drams_per_ctrl`. A key that is absent
//! yields its default; a key that is present with the wrong type is an error.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::ConfigError;
use crate::common::constants::{MAX_LINE_SIZE, MIN_LINE_SIZE};

/// Default configuration constants.
///
/// These values define the device and controller configuration when a key is not
/// explicitly present.
pub mod defaults {
    /// Backend kind selector.
    pub const MEMORY_TYPE: &str = "DDR";

    /// Ranks per channel.
    pub const RANKS_PER_CHANNEL: u32 = 4;

    /// Banks per rank (DDR3 standard is 8).
    pub const BANKS_PER_RANK: u32 = 8;

    /// Row size in bytes (1Kb columns, x4 devices).
    pub const PAGE_SIZE: u32 = 8 * 1024;

    /// Timing parameter set.
    pub const TECH: &str = "DDR3-1333-CL10";

    /// Device-internal address decomposition order; the row always sits on top.
    pub const ADDR_MAPPING: &str = "rank:col:bank";

    /// Writes are deferred and posted to hide write-to-read turnaround.
    pub const DEFER_WRITES: bool = true;

    /// Rows are precharged after each access.
    pub const CLOSED_PAGE: bool = true;

    /// Consecutive row hits served before the row is closed for fairness.
    pub const MAX_ROW_HITS: u32 = 4;

    /// Backend request queue capacity.
    pub const QUEUE_DEPTH: u32 = 16;

    /// Fixed controller latency in system cycles.
    pub const CONTROLLER_LATENCY: u32 = 10;

    /// Number of in-package devices per controller.
    pub const MC_DRAMS_PER_CTRL: u32 = 0;

    /// Interleaving granularity in lines.
    pub const MAP_GRANULARITY: u32 = 64;

    /// Cache line size in bytes.
    pub const LINE_SIZE: u32 = 64;

    /// Routing strategy name.
    pub const ROUTING: &str = "inPackageFirst";
}

/// Configuration keys read by the controller.
pub mod keys {
    /// Cache line size in bytes.
    pub const LINE_SIZE: &str = "sys.lineSize";
    /// External pool section.
    pub const EXT_DRAM: &str = "sys.mem.ext_dram";
    /// In-package pool section.
    pub const MC_DRAM: &str = "sys.mem.mc_dram";
    /// In-package device count, relative to `MC_DRAM`.
    pub const MC_DRAMS_PER_CTRL: &str = "mc_drams_per_ctrl";
    /// Interleaving granularity.
    pub const MAP_GRANULARITY: &str = "sys.mem.mapGranu";
    /// Routing strategy.
    pub const ROUTING: &str = "sys.mem.routing";
}

/// Read-only key/value accessor with typed defaults.
///
/// Implementations are injected into the controller and the device factory; nothing in this
/// crate reads process-wide configuration.
pub trait ConfigLookup {
    /// Returns `true` if `key` names a value or a section.
    fn exists(&self, key: &str) -> bool;

    /// Reads an unsigned integer, or `default` if the key is absent.
    ///
    /// # Errors
    ///
    /// `ConfigError::TypeMismatch` if the key holds something other than a `u32`.
    fn get_u32(&self, key: &str, default: u32) -> Result<u32, ConfigError>;

    /// Reads a boolean, or `default` if the key is absent.
    ///
    /// # Errors
    ///
    /// `ConfigError::TypeMismatch` if the key holds something other than a boolean.
    fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError>;

    /// Reads a string, or `default` if the key is absent.
    ///
    /// # Errors
    ///
    /// `ConfigError::TypeMismatch` if the key holds something other than a string.
    fn get_str(&self, key: &str, default: &str) -> Result<String, ConfigError>;
}

/// JSON-backed configuration tree.
///
/// # Examples
///
/// ```
/// use mcsim_core::config::{ConfigLookup, ConfigTree};
///
/// let cfg = ConfigTree::from_json_str(r#"{ "sys": { "mem": { "mapGranu": 1 } } }"#).unwrap();
/// assert!(cfg.exists("sys.mem"));
/// assert_eq!(cfg.get_u32("sys.mem.mapGranu", 64).unwrap(), 1);
/// assert_eq!(cfg.get_u32("sys.mem.missing", 7).unwrap(), 7);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    /// Wraps an already-parsed JSON value.
    pub const fn new(root: Value) -> Self {
        Self { root }
    }

    /// Parses a configuration tree from JSON text.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` if the text is not valid JSON.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - File to read.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io` if the file cannot be read, `ConfigError::Parse` if it is not JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Returns the underlying JSON value.
    pub const fn root(&self) -> &Value {
        &self.root
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .filter(|part| !part.is_empty())
            .try_fold(&self.root, |node, part| node.get(part))
    }

    fn mismatch(key: &str, expected: &'static str, found: &Value) -> ConfigError {
        ConfigError::TypeMismatch {
            key: key.to_owned(),
            expected,
            found: found.to_string(),
        }
    }
}

impl From<Value> for ConfigTree {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

impl ConfigLookup for ConfigTree {
    fn exists(&self, key: &str) -> bool {
        self.lookup(key).is_some_and(|v| !v.is_null())
    }

    fn get_u32(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        match self.lookup(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| Self::mismatch(key, "unsigned 32-bit integer", v)),
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.lookup(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| Self::mismatch(key, "boolean", v)),
        }
    }

    fn get_str(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        match self.lookup(key) {
            None | Some(Value::Null) => Ok(default.to_owned()),
            Some(v) => v
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| Self::mismatch(key, "string", v)),
        }
    }
}

/// Backend memory kinds.
///
/// Only DDR is implemented; the enum exists so the factory dispatches on a closed set
/// rather than on strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemoryType {
    /// Off-package or die-stacked DDR channel.
    #[default]
    #[serde(rename = "DDR")]
    Ddr,
}

impl FromStr for MemoryType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DDR" => Ok(Self::Ddr),
            other => Err(other.to_owned()),
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ddr => f.write_str("DDR"),
        }
    }
}

/// Routing strategies choosing which pool serves a non-bypassed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Routing {
    /// In-package pool when configured, otherwise the external pool.
    #[default]
    InPackageFirst,
    /// Every request goes to the external pool.
    ExternalOnly,
    /// Odd lines go to the external pool, even lines to the in-package pool.
    ParitySplit,
}

impl Routing {
    /// Returns the configuration name of this policy.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InPackageFirst => "inPackageFirst",
            Self::ExternalOnly => "externalOnly",
            Self::ParitySplit => "paritySplit",
        }
    }
}

impl FromStr for Routing {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inPackageFirst" => Ok(Self::InPackageFirst),
            "externalOnly" => Ok(Self::ExternalOnly),
            "paritySplit" => Ok(Self::ParitySplit),
            other => Err(ConfigError::UnknownRouting(other.to_owned())),
        }
    }
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-device options for a DDR backend.
///
/// Loaded from a `ConfigLookup` under a pool prefix such as `sys.mem.ext_dram.`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DramConfig {
    /// Ranks per channel.
    pub ranks_per_channel: u32,
    /// Banks per rank.
    pub banks_per_rank: u32,
    /// Row size in bytes.
    pub page_size: u32,
    /// Timing parameter set name.
    pub tech: String,
    /// Address decomposition order, most-significant field first.
    pub addr_mapping: String,
    /// Post dirty writebacks after the controller latency.
    pub defer_writes: bool,
    /// Precharge after every access.
    pub closed_page: bool,
    /// Consecutive row hits before the row is force-closed.
    pub max_row_hits: u32,
    /// Requests in flight before arrivals stall.
    pub queue_depth: u32,
    /// Fixed system cycles added per request.
    pub controller_latency: u32,
}

impl Default for DramConfig {
    fn default() -> Self {
        Self {
            ranks_per_channel: defaults::RANKS_PER_CHANNEL,
            banks_per_rank: defaults::BANKS_PER_RANK,
            page_size: defaults::PAGE_SIZE,
            tech: defaults::TECH.to_owned(),
            addr_mapping: defaults::ADDR_MAPPING.to_owned(),
            defer_writes: defaults::DEFER_WRITES,
            closed_page: defaults::CLOSED_PAGE,
            max_row_hits: defaults::MAX_ROW_HITS,
            queue_depth: defaults::QUEUE_DEPTH,
            controller_latency: defaults::CONTROLLER_LATENCY,
        }
    }
}

impl DramConfig {
    /// Reads every device option under `prefix`, falling back to the defaults.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Configuration source.
    /// * `prefix` - Pool prefix including the trailing dot, e.g. `sys.mem.mc_dram.`.
    ///
    /// # Errors
    ///
    /// Type mismatches from the lookup. Value validation happens in [`DramConfig::validate`].
    pub fn load(cfg: &dyn ConfigLookup, prefix: &str) -> Result<Self, ConfigError> {
        let key = |name: &str| format!("{prefix}{name}");
        Ok(Self {
            ranks_per_channel: cfg.get_u32(&key("ranksPerChannel"), defaults::RANKS_PER_CHANNEL)?,
            banks_per_rank: cfg.get_u32(&key("banksPerRank"), defaults::BANKS_PER_RANK)?,
            page_size: cfg.get_u32(&key("pageSize"), defaults::PAGE_SIZE)?,
            tech: cfg.get_str(&key("tech"), defaults::TECH)?,
            addr_mapping: cfg.get_str(&key("addrMapping"), defaults::ADDR_MAPPING)?,
            defer_writes: cfg.get_bool(&key("deferWrites"), defaults::DEFER_WRITES)?,
            closed_page: cfg.get_bool(&key("closedPage"), defaults::CLOSED_PAGE)?,
            max_row_hits: cfg.get_u32(&key("maxRowHits"), defaults::MAX_ROW_HITS)?,
            queue_depth: cfg.get_u32(&key("queueDepth"), defaults::QUEUE_DEPTH)?,
            controller_latency: cfg
                .get_u32(&key("controllerLatency"), defaults::CONTROLLER_LATENCY)?,
        })
    }

    /// Checks geometry against the line size.
    ///
    /// # Errors
    ///
    /// `ConfigError::BadGeometry` when a count is zero or the row size is not a whole
    /// number of lines.
    pub fn validate(&self, line_size: u32) -> Result<(), ConfigError> {
        let bad = |key: &str, value: u32, reason| ConfigError::BadGeometry {
            key: key.to_owned(),
            value: u64::from(value),
            reason,
        };
        if self.ranks_per_channel == 0 {
            return Err(bad("ranksPerChannel", 0, "must be at least 1"));
        }
        if self.banks_per_rank == 0 {
            return Err(bad("banksPerRank", 0, "must be at least 1"));
        }
        if self.queue_depth == 0 {
            return Err(bad("queueDepth", 0, "must be at least 1"));
        }
        if line_size == 0 || self.page_size < line_size || self.page_size % line_size != 0 {
            return Err(bad(
                "pageSize",
                self.page_size,
                "must be a non-zero multiple of the line size",
            ));
        }
        Ok(())
    }
}

/// Reads and validates the process-wide line size.
///
/// # Errors
///
/// `ConfigError::BadLineSize` unless the value is a power of two in `8..=4096`.
pub fn line_size(cfg: &dyn ConfigLookup) -> Result<u32, ConfigError> {
    check_line_size(cfg.get_u32(keys::LINE_SIZE, defaults::LINE_SIZE)?)
}

/// Validates a line size.
///
/// # Errors
///
/// `ConfigError::BadLineSize` unless `size` is a power of two in `8..=4096`.
pub fn check_line_size(size: u32) -> Result<u32, ConfigError> {
    if !size.is_power_of_two() || !(MIN_LINE_SIZE..=MAX_LINE_SIZE).contains(&size) {
        return Err(ConfigError::BadLineSize(size));
    }
    Ok(size)
}
