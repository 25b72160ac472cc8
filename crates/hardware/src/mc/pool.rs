//! Backend pools.
//!
//! A pool is a named group of devices sharing one configuration profile. The external pool is
//! a single device; the in-package pool interleaves lines across its devices.

use crate::common::{ConfigError, LineAddr};
use crate::config::MemoryType;
use crate::dram::MemoryDevice;
use crate::request::MemRequest;

use super::interleave::Interleaver;

/// One pool of backend devices.
#[derive(Debug)]
pub enum BackendPool {
    /// One device with identity routing.
    Single {
        /// Backend kind.
        kind: MemoryType,
        /// The device.
        device: Box<dyn MemoryDevice>,
    },
    /// Several identically configured devices behind an interleaver.
    Interleaved {
        /// Backend kind.
        kind: MemoryType,
        /// Devices in index order.
        devices: Vec<Box<dyn MemoryDevice>>,
        /// Line-to-device mapping.
        interleaver: Interleaver,
    },
}

impl BackendPool {
    /// Wraps a single device.
    pub fn single(kind: MemoryType, device: Box<dyn MemoryDevice>) -> Self {
        Self::Single { kind, device }
    }

    /// Interleaves lines across `devices` in blocks of `granularity` lines.
    ///
    /// # Errors
    ///
    /// Zero granularity or an empty device list.
    pub fn interleaved(
        kind: MemoryType,
        devices: Vec<Box<dyn MemoryDevice>>,
        granularity: u64,
    ) -> Result<Self, ConfigError> {
        let interleaver = Interleaver::new(granularity, devices.len())?;
        Ok(Self::Interleaved {
            kind,
            devices,
            interleaver,
        })
    }

    /// Backend kind of the pool.
    pub const fn kind(&self) -> MemoryType {
        match self {
            Self::Single { kind, .. } | Self::Interleaved { kind, .. } => *kind,
        }
    }

    /// Line-to-device mapping of the pool.
    pub const fn interleaver(&self) -> Interleaver {
        match self {
            Self::Single { .. } => Interleaver::identity(),
            Self::Interleaved { interleaver, .. } => *interleaver,
        }
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Interleaved { devices, .. } => devices.len(),
        }
    }

    /// Always `false`; pools are never built empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maps a global line to `(device index, device-local line)`.
    pub const fn route(&self, line: LineAddr) -> (usize, LineAddr) {
        self.interleaver().map(line)
    }

    /// Iterates the devices in index order.
    pub fn devices(&self) -> impl Iterator<Item = &dyn MemoryDevice> + '_ {
        let slice: &[Box<dyn MemoryDevice>] = match self {
            Self::Single { device, .. } => std::slice::from_ref(device),
            Self::Interleaved { devices, .. } => devices,
        };
        slice.iter().map(|d| &**d)
    }

    /// Sends `req` to the device owning its line, with the address rewritten to the
    /// device-local line.
    ///
    /// The caller's request is left untouched; the device sees a routed copy.
    ///
    /// # Returns
    ///
    /// `(device index, device-local line, completion cycle)`.
    pub fn dispatch(&mut self, req: &MemRequest) -> (usize, LineAddr, u64) {
        let (index, local) = self.route(req.line_addr);
        let routed = MemRequest {
            line_addr: local,
            ..*req
        };
        let device = match self {
            Self::Single { device, .. } => device,
            Self::Interleaved { devices, .. } => &mut devices[index],
        };
        (index, local, device.access(&routed))
    }
}
