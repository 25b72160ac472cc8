//! Global constants.
//!
//! This module defines process-wide constants used across the controller. It includes:
//! 1. **Memory Constants:** Page size used for footprint accounting.
//! 2. **Line Constants:** Bounds on the configurable cache line size.
//! 3. **Device Constants:** Fixed DDR burst length.

/// Page size in bytes (4KB) used for footprint accounting.
pub const PAGE_SIZE: u64 = 4096;

/// Smallest accepted cache line size in bytes.
pub const MIN_LINE_SIZE: u32 = 8;

/// Largest accepted cache line size in bytes (one line per page).
pub const MAX_LINE_SIZE: u32 = PAGE_SIZE as u32;

/// DDR burst length in memory clock cycles (BL8 on a double data rate bus).
pub const DDR_BURST_CYCLES: u32 = 4;

/// Returns the number of lines in a 4KB page for the given line size.
///
/// # Arguments
///
/// * `line_size` - Cache line size in bytes; must divide `PAGE_SIZE`.
#[inline]
pub const fn lines_per_page(line_size: u32) -> u64 {
    PAGE_SIZE / line_size as u64
}
