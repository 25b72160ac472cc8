//! Line-to-device address interleaving.
//!
//! Line addresses are cut into blocks of `granularity` consecutive lines and the blocks are
//! dealt round-robin across the devices. Inside a device a block keeps its offset, so lines
//! that are contiguous globally stay contiguous locally and row-buffer locality survives.
//!
//! ```text
//! device = (line / g) % n
//! local  = (line / g / n) * g + (line % g)
//! ```
//!
//! With `g` a power of two the `+` is the same as OR-ing in the offset bits.

use crate::common::{ConfigError, LineAddr};

/// Granularity-based interleaver over a fixed number of devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interleaver {
    granularity: u64,
    devices: u64,
}

impl Interleaver {
    /// Creates an interleaver.
    ///
    /// # Arguments
    ///
    /// * `granularity` - Consecutive lines per device before rotating.
    /// * `devices` - Number of devices.
    ///
    /// # Errors
    ///
    /// `ConfigError::ZeroGranularity` if `granularity` is zero, `ConfigError::BadGeometry`
    /// if `devices` is zero.
    pub fn new(granularity: u64, devices: usize) -> Result<Self, ConfigError> {
        if granularity == 0 {
            return Err(ConfigError::ZeroGranularity);
        }
        if devices == 0 {
            return Err(ConfigError::BadGeometry {
                key: "mc_drams_per_ctrl".to_owned(),
                value: 0,
                reason: "an interleaved pool needs at least one device",
            });
        }
        Ok(Self {
            granularity,
            devices: devices as u64,
        })
    }

    /// Identity routing for a single device.
    pub const fn identity() -> Self {
        Self {
            granularity: 1,
            devices: 1,
        }
    }

    /// Lines per block.
    pub const fn granularity(&self) -> u64 {
        self.granularity
    }

    /// Number of devices.
    pub const fn devices(&self) -> usize {
        self.devices as usize
    }

    /// Maps a global line to `(device index, device-local line)`.
    #[inline]
    pub const fn map(&self, line: LineAddr) -> (usize, LineAddr) {
        let a = line.0;
        let block = a / self.granularity;
        let device = (block % self.devices) as usize;
        let local = (block / self.devices) * self.granularity + a % self.granularity;
        (device, LineAddr(local))
    }

    /// Inverse of [`Interleaver::map`].
    #[inline]
    pub const fn unmap(&self, device: usize, local: LineAddr) -> LineAddr {
        let l = local.0;
        let block = (l / self.granularity) * self.devices + device as u64;
        LineAddr(block * self.granularity + l % self.granularity)
    }
}
