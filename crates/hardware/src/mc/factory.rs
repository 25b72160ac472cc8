//! Backend device factory.
//!
//! Builds one configured device from a pool's configuration prefix. Every option has a
//! default, so an empty section still yields a valid device.

use crate::common::ConfigError;
use crate::config::{ConfigLookup, DramConfig, MemoryType, defaults};
use crate::dram::{DdrMemory, DeviceContext, MemoryDevice};

/// Reads and checks the backend kind of a pool section.
///
/// # Arguments
///
/// * `cfg` - Configuration source.
/// * `prefix` - Pool prefix including the trailing dot.
///
/// # Errors
///
/// `ConfigError::UnsupportedMemoryType` for anything but `DDR`.
pub fn pool_kind(cfg: &dyn ConfigLookup, prefix: &str) -> Result<MemoryType, ConfigError> {
    let kind = cfg.get_str(&format!("{prefix}type"), defaults::MEMORY_TYPE)?;
    kind.parse::<MemoryType>()
        .map_err(|kind| ConfigError::UnsupportedMemoryType {
            kind,
            prefix: prefix.to_owned(),
        })
}

/// Builds one backend device.
///
/// # Arguments
///
/// * `cfg` - Configuration source.
/// * `kind` - Backend kind.
/// * `prefix` - Pool prefix including the trailing dot.
/// * `name` - Device name.
/// * `ctx` - Line size, frequency and clock domain.
///
/// # Errors
///
/// Lookup type mismatches and device option validation failures.
pub fn build_device(
    cfg: &dyn ConfigLookup,
    kind: MemoryType,
    prefix: &str,
    name: String,
    ctx: &DeviceContext,
) -> Result<Box<dyn MemoryDevice>, ConfigError> {
    match kind {
        MemoryType::Ddr => {
            let options = DramConfig::load(cfg, prefix)?;
            Ok(Box::new(DdrMemory::new(name, &options, ctx)?))
        }
    }
}
