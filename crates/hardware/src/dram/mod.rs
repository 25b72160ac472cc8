//! Backend memory devices.
//!
//! This module provides:
//! 1. **MemoryDevice:** The black-box interface the controller dispatches to.
//! 2. **DdrMemory:** Row-buffer-aware DDR channel model (the only supported kind).
//! 3. **Technology tables:** Named DDR timing parameter sets.
//! 4. **Address mapping:** Decomposition of a device-local line into rank, bank, row and column.
//!
//! Devices are `Send` so the controller can keep them behind its dispatch lock and be shared
//! across requester threads.

/// Device-internal address mapping.
pub mod mapping;

/// DDR timing parameter sets.
pub mod tech;

/// DDR channel model.
pub mod ddr;

pub use ddr::DdrMemory;
pub use mapping::{AddrMapping, DramCoord, Geometry};
pub use tech::DdrTiming;

use std::fmt;

use crate::request::MemRequest;
use crate::stats::StatsSink;

/// Controller-wide parameters every device is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceContext {
    /// Cache line size in bytes.
    pub line_size: u32,
    /// System clock frequency in MHz.
    pub frequency_mhz: u32,
    /// Clock domain the device belongs to.
    pub domain: u32,
}

/// Trait for backend memory devices that report a completion cycle per access.
///
/// Implementors own their timing state exclusively; the controller guarantees at most one
/// concurrent call per controller instance.
pub trait MemoryDevice: Send + fmt::Debug {
    /// Returns the device name used in logs and the stats hierarchy.
    fn name(&self) -> &str;

    /// Services one request.
    ///
    /// # Arguments
    ///
    /// * `req` - Request whose `line_addr` is already device-local and whose `cycle` is the
    ///   issue cycle.
    ///
    /// # Returns
    ///
    /// Completion cycle in system cycles.
    fn access(&mut self, req: &MemRequest) -> u64;

    /// Reports this device's counters as a group named after the device.
    fn report_stats(&self, sink: &mut dyn StatsSink);
}
