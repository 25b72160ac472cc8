//! Memory request definitions.
//!
//! This module defines the request record exchanged between the last-level cache and the
//! controller. It provides:
//! 1. **Access Types:** GETS/GETX reads and PUTS/PUTX writebacks.
//! 2. **Flags:** Hints such as "no exclusive" that influence the granted state.
//! 3. **Coherence States:** The MESI state slot written back to the requester.
//! 4. **Requests:** `MemRequest`, mutated in place by the controller for one call.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::common::{LineAddr, ProtocolError};

/// Request types arriving from the last-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// GETS: read for sharing.
    ReadShared,
    /// GETX: read for ownership.
    ReadExclusive,
    /// PUTS: clean eviction; nothing to write.
    WritebackClean,
    /// PUTX: dirty eviction; data must be written back.
    WritebackDirty,
}

impl AccessType {
    /// Returns the conventional mnemonic (`GETS`, `GETX`, `PUTS`, `PUTX`).
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::ReadShared => "GETS",
            Self::ReadExclusive => "GETX",
            Self::WritebackClean => "PUTS",
            Self::WritebackDirty => "PUTX",
        }
    }

    /// Returns `true` for writebacks (PUTS/PUTX).
    pub const fn is_writeback(&self) -> bool {
        matches!(self, Self::WritebackClean | Self::WritebackDirty)
    }

    /// Parses a mnemonic or a raw numeric code.
    ///
    /// # Errors
    ///
    /// `ProtocolError::UnknownRequestType` for unrecognized codes. Unparseable text is
    /// reported with code `u8::MAX`.
    pub fn parse(token: &str) -> Result<Self, ProtocolError> {
        match token {
            "GETS" => Ok(Self::ReadShared),
            "GETX" => Ok(Self::ReadExclusive),
            "PUTS" => Ok(Self::WritebackClean),
            "PUTX" => Ok(Self::WritebackDirty),
            other => other
                .parse::<u8>()
                .map_err(|_| ProtocolError::UnknownRequestType(u8::MAX))
                .and_then(Self::try_from),
        }
    }
}

impl TryFrom<u8> for AccessType {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::ReadShared),
            1 => Ok(Self::ReadExclusive),
            2 => Ok(Self::WritebackClean),
            3 => Ok(Self::WritebackDirty),
            other => Err(ProtocolError::UnknownRequestType(other)),
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// MESI coherence states granted to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MesiState {
    /// Not present.
    #[default]
    Invalid,
    /// Read-only, possibly shared.
    Shared,
    /// Clean and exclusively owned.
    Exclusive,
    /// Dirty and exclusively owned.
    Modified,
}

/// Request flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ReqFlags(pub u32);

impl ReqFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Instruction fetch.
    pub const IFETCH: Self = Self(1 << 1);
    /// Do not grant exclusive on a GETS, even if no other sharer exists.
    pub const NOEXCL: Self = Self(1 << 2);
    /// Hardware prefetch.
    pub const PREFETCH: Self = Self(1 << 4);

    /// Returns `true` if every bit of `flag` is set.
    #[inline]
    pub const fn is(&self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl BitOr for ReqFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A memory request from the last-level cache.
///
/// Owned by the caller and mutated in place by the controller: `state` receives the granted
/// coherence state and `cycle` turns from the issue cycle into the completion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemRequest {
    /// Request type.
    pub kind: AccessType,
    /// Target line.
    pub line_addr: LineAddr,
    /// Request flags.
    pub flags: ReqFlags,
    /// Output: granted coherence state.
    pub state: MesiState,
    /// Input: issue cycle. Output: completion cycle.
    pub cycle: u64,
    /// Identifier of the issuing requester (core or cache bank).
    pub src_id: u32,
}

impl MemRequest {
    /// Creates a request with no flags from requester 0.
    ///
    /// # Arguments
    ///
    /// * `kind` - Request type.
    /// * `line_addr` - Target line.
    /// * `cycle` - Issue cycle.
    pub const fn new(kind: AccessType, line_addr: LineAddr, cycle: u64) -> Self {
        Self {
            kind,
            line_addr,
            flags: ReqFlags::NONE,
            state: MesiState::Invalid,
            cycle,
            src_id: 0,
        }
    }

    /// Decodes a request from a raw type code.
    ///
    /// # Errors
    ///
    /// `ProtocolError::UnknownRequestType` if `code` is not GETS/GETX/PUTS/PUTX.
    pub fn from_raw(code: u8, line_addr: u64, flags: u32, cycle: u64) -> Result<Self, ProtocolError> {
        Ok(Self::new(AccessType::try_from(code)?, LineAddr(line_addr), cycle).with_flags(ReqFlags(flags)))
    }

    /// Returns the request with `flags` added.
    #[must_use]
    pub const fn with_flags(mut self, flags: ReqFlags) -> Self {
        self.flags = ReqFlags(self.flags.0 | flags.0);
        self
    }

    /// Returns the request tagged with a requester id.
    #[must_use]
    pub const fn with_src(mut self, src_id: u32) -> Self {
        self.src_id = src_id;
        self
    }

    /// Returns `true` if `flag` is set on this request.
    #[inline]
    pub const fn is(&self, flag: ReqFlags) -> bool {
        self.flags.is(flag)
    }
}
