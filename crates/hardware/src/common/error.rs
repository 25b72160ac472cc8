//! Configuration and protocol error definitions.
//!
//! This module defines the error taxonomy of the controller. It provides:
//! 1. **Configuration Errors:** Anything that makes the simulated memory system undefined
//!    (unsupported backend kind, no pool configured, malformed device options).
//! 2. **Protocol Errors:** Request codes a requester should never produce.
//! 3. **Controller Errors:** Either of the above, tagged with the controller name.
//!
//! All of these are terminal for a simulation run; nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A key exists but holds a value of the wrong type.
    #[error("config key `{key}`: expected {expected}, found `{found}`")]
    TypeMismatch {
        /// Dotted key path.
        key: String,
        /// Human-readable expected type.
        expected: &'static str,
        /// The offending value, rendered as JSON.
        found: String,
    },

    /// A pool requested a backend kind other than DDR.
    #[error("unsupported memory type `{kind}` under `{prefix}` (only DDR is implemented)")]
    UnsupportedMemoryType {
        /// The requested kind.
        kind: String,
        /// Config prefix of the pool.
        prefix: String,
    },

    /// Neither the external nor the in-package pool is configured.
    #[error("no DRAM module is specified")]
    NoMemory,

    /// Interleaving granularity of zero.
    #[error("interleaving granularity must be at least 1 line")]
    ZeroGranularity,

    /// Unknown DRAM technology name.
    #[error("unknown DRAM technology `{0}`")]
    UnknownTech(String),

    /// Malformed device-internal address mapping.
    #[error("invalid address mapping `{0}` (expected a permutation of rank:col:bank)")]
    BadAddrMapping(String),

    /// Unknown routing policy name.
    #[error("unknown routing policy `{0}`")]
    UnknownRouting(String),

    /// Routing policy needs a pool that is not configured.
    #[error("routing policy `{policy}` requires the {pool} pool")]
    RoutingNeedsPool {
        /// Policy name.
        policy: &'static str,
        /// Missing pool name.
        pool: &'static str,
    },

    /// Line size that is not a power of two in the accepted range.
    #[error("invalid line size {0} (must be a power of two between 8 and 4096 bytes)")]
    BadLineSize(u32),

    /// Device geometry option out of range.
    #[error("invalid value {value} for `{key}`: {reason}")]
    BadGeometry {
        /// Dotted key path.
        key: String,
        /// Offending value.
        value: u64,
        /// What the value must satisfy.
        reason: &'static str,
    },

    /// Traffic driver parameter out of range.
    #[error("invalid workload `{field}`: {reason}")]
    BadWorkload {
        /// Parameter name.
        field: &'static str,
        /// What the value must satisfy.
        reason: &'static str,
    },

    /// Config file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid JSON.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by requests that violate the requester contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Raw request type code outside GETS/GETX/PUTS/PUTX.
    #[error("unrecognized request type {0}")]
    UnknownRequestType(u8),
}

/// Top-level controller error carrying the controller name as context.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Configuration failure while building the controller.
    #[error("[{name}] {source}")]
    Config {
        /// Controller name.
        name: String,
        /// Underlying configuration error.
        #[source]
        source: ConfigError,
    },

    /// Protocol violation observed by the controller.
    #[error("[{name}] {source}")]
    Protocol {
        /// Controller name.
        name: String,
        /// Underlying protocol error.
        #[source]
        source: ProtocolError,
    },
}

impl ControllerError {
    /// Wraps a configuration error with the controller name.
    pub fn config(name: &str, source: ConfigError) -> Self {
        Self::Config {
            name: name.to_owned(),
            source,
        }
    }

    /// Wraps a protocol error with the controller name.
    pub fn protocol(name: &str, source: ProtocolError) -> Self {
        Self::Protocol {
            name: name.to_owned(),
            source,
        }
    }
}
