//! Backend pool selection strategies.
//!
//! When both an external and an in-package pool exist, a strategy decides which one serves
//! each non-bypassed request. The strategy is chosen by `sys.mem.routing`.
//!
//! # Strategies
//!
//! - `InPackageFirst`: In-package pool when configured, otherwise external.
//! - `ExternalOnly`: Always the external pool.
//! - `ParitySplit`: Odd lines to the external pool, even lines to the in-package pool.

use std::fmt;

use crate::common::{ConfigError, LineAddr};
use crate::config::Routing;

/// Identifies one of the two backend pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolId {
    /// Off-package DRAM.
    External,
    /// Die-stacked DRAM devices.
    InPackage,
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => f.write_str("external"),
            Self::InPackage => f.write_str("in-package"),
        }
    }
}

/// Trait for pool selection strategies.
pub trait PoolSelector: Send + Sync + fmt::Debug {
    /// Chooses the pool that serves `line`.
    fn select(&self, line: LineAddr) -> PoolId;

    /// Configuration name of the strategy.
    fn policy(&self) -> Routing;
}

/// In-package pool when present, external otherwise.
#[derive(Debug, Clone, Copy)]
pub struct InPackageFirst {
    has_in_package: bool,
}

impl PoolSelector for InPackageFirst {
    fn select(&self, _line: LineAddr) -> PoolId {
        if self.has_in_package {
            PoolId::InPackage
        } else {
            PoolId::External
        }
    }

    fn policy(&self) -> Routing {
        Routing::InPackageFirst
    }
}

/// Everything to the external pool.
#[derive(Debug, Clone, Copy)]
pub struct ExternalOnly;

impl PoolSelector for ExternalOnly {
    fn select(&self, _line: LineAddr) -> PoolId {
        PoolId::External
    }

    fn policy(&self) -> Routing {
        Routing::ExternalOnly
    }
}

/// Low address bit picks the pool.
#[derive(Debug, Clone, Copy)]
pub struct ParitySplit;

impl PoolSelector for ParitySplit {
    fn select(&self, line: LineAddr) -> PoolId {
        if line.val() & 1 == 1 {
            PoolId::External
        } else {
            PoolId::InPackage
        }
    }

    fn policy(&self) -> Routing {
        Routing::ParitySplit
    }
}

/// Builds the selector for `policy`, checking that the pools it needs exist.
///
/// # Arguments
///
/// * `policy` - Configured routing policy.
/// * `has_external` - The external pool is configured.
/// * `has_in_package` - The in-package pool is configured.
///
/// # Errors
///
/// `ConfigError::RoutingNeedsPool` when the policy names a missing pool.
pub fn build_selector(
    policy: Routing,
    has_external: bool,
    has_in_package: bool,
) -> Result<Box<dyn PoolSelector>, ConfigError> {
    let need = |present: bool, pool: &'static str| {
        if present {
            Ok(())
        } else {
            Err(ConfigError::RoutingNeedsPool {
                policy: policy.as_str(),
                pool,
            })
        }
    };
    match policy {
        Routing::InPackageFirst => Ok(Box::new(InPackageFirst { has_in_package })),
        Routing::ExternalOnly => {
            need(has_external, "external")?;
            Ok(Box::new(ExternalOnly))
        }
        Routing::ParitySplit => {
            need(has_external, "external")?;
            need(has_in_package, "in-package")?;
            Ok(Box::new(ParitySplit))
        }
    }
}
