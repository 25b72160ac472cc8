//! Line and page address types.
//!
//! This module defines strong types for the two address granularities the controller
//! deals in. It provides the following:
//! 1. **Type Safety:** Distinguishes cache-line addresses from page addresses at compile time.
//! 2. **Address Manipulation:** Derives the enclosing page of a line and exposes raw values.
//! 3. **Routing Integration:** Acts as the unit of traffic for interleaving and bookkeeping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a fixed-size cache line.
///
/// Line addresses are byte addresses divided by the configured line size; the controller
/// never sees byte offsets within a line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineAddr(pub u64);

/// Address of a page, in units of pages.
///
/// A page address is a line address divided by the number of lines per page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageAddr(pub u64);

impl LineAddr {
    /// Creates a new line address from a raw 64-bit value.
    ///
    /// # Arguments
    ///
    /// * `addr` - The raw line index.
    ///
    /// # Returns
    ///
    /// A new `LineAddr` instance wrapping the provided value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit line index.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Returns the page containing this line.
    ///
    /// # Arguments
    ///
    /// * `lines_per_page` - Number of lines in one page; must be non-zero.
    ///
    /// # Returns
    ///
    /// The enclosing `PageAddr`.
    #[inline]
    pub const fn page(&self, lines_per_page: u64) -> PageAddr {
        PageAddr(self.0 / lines_per_page)
    }
}

impl PageAddr {
    /// Creates a new page address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit page index.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LineAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Display for PageAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for LineAddr {
    fn from(addr: u64) -> Self {
        Self(addr)
    }
}
