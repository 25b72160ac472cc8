//! DDR technology timing tables.
//!
//! Each entry gives the memory clock period and the core command latencies in memory cycles.
//! Latencies are converted to system cycles at the controller frequency, rounding up.

use crate::common::ConfigError;

/// Timing parameters of one DDR speed grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdrTiming {
    /// Technology name, e.g. `DDR3-1333-CL10`.
    pub name: &'static str,
    /// Memory clock period in picoseconds.
    pub tck_ps: u64,
    /// CAS latency.
    pub cl: u32,
    /// Activate to read/write.
    pub rcd: u32,
    /// Precharge period.
    pub rp: u32,
}

/// Supported speed grades.
pub const TECHS: &[DdrTiming] = &[
    DdrTiming {
        name: "DDR3-1066-CL7",
        tck_ps: 1875,
        cl: 7,
        rcd: 7,
        rp: 7,
    },
    DdrTiming {
        name: "DDR3-1333-CL10",
        tck_ps: 1500,
        cl: 10,
        rcd: 10,
        rp: 10,
    },
    DdrTiming {
        name: "DDR3-1600-CL11",
        tck_ps: 1250,
        cl: 11,
        rcd: 11,
        rp: 11,
    },
];

impl DdrTiming {
    /// Finds a speed grade by name.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownTech` if no entry matches.
    pub fn lookup(name: &str) -> Result<&'static Self, ConfigError> {
        TECHS
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConfigError::UnknownTech(name.to_owned()))
    }

    /// Converts memory cycles to system cycles, rounding up.
    ///
    /// # Arguments
    ///
    /// * `mem_cycles` - Duration in memory clock cycles.
    /// * `sys_freq_mhz` - System clock frequency in MHz.
    pub const fn to_sys_cycles(&self, mem_cycles: u64, sys_freq_mhz: u32) -> u64 {
        (mem_cycles * self.tck_ps * sys_freq_mhz as u64).div_ceil(1_000_000)
    }
}
