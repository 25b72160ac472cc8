//! Device-internal address decomposition.
//!
//! A mapping string lists `rank`, `col` and `bank` from most to least significant; the row
//! index always takes whatever is left above them. With the default `rank:col:bank`,
//! consecutive lines rotate across banks first, then walk a row, then switch ranks.

use std::fmt;

use crate::common::{ConfigError, LineAddr};

/// One field of the decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Rank select.
    Rank,
    /// Column (line within a row).
    Col,
    /// Bank within a rank.
    Bank,
}

/// Device geometry in lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Ranks per channel.
    pub ranks: u32,
    /// Banks per rank.
    pub banks: u32,
    /// Lines per row.
    pub cols: u32,
}

impl Geometry {
    const fn size(&self, field: Field) -> u64 {
        match field {
            Field::Rank => self.ranks as u64,
            Field::Col => self.cols as u64,
            Field::Bank => self.banks as u64,
        }
    }

    /// Total number of banks across ranks.
    pub const fn total_banks(&self) -> usize {
        self.ranks as usize * self.banks as usize
    }
}

/// Decoded DRAM coordinates of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DramCoord {
    /// Rank index.
    pub rank: u32,
    /// Bank index within the rank.
    pub bank: u32,
    /// Row index.
    pub row: u64,
    /// Column (line within the row).
    pub col: u32,
}

/// Parsed address mapping, most-significant field first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrMapping {
    order: [Field; 3],
}

impl AddrMapping {
    /// Parses a mapping string such as `rank:col:bank`.
    ///
    /// # Errors
    ///
    /// `ConfigError::BadAddrMapping` unless the string names each field exactly once.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let bad = || ConfigError::BadAddrMapping(text.to_owned());
        let mut order = Vec::with_capacity(3);
        for token in text.split(':') {
            let field = match token.trim() {
                "rank" => Field::Rank,
                "col" => Field::Col,
                "bank" => Field::Bank,
                _ => return Err(bad()),
            };
            if order.contains(&field) {
                return Err(bad());
            }
            order.push(field);
        }
        let order: [Field; 3] = order.try_into().map_err(|_| bad())?;
        Ok(Self { order })
    }

    /// Splits a device-local line into DRAM coordinates.
    pub fn decode(&self, line: LineAddr, geometry: &Geometry) -> DramCoord {
        let mut rest = line.val();
        let mut coord = DramCoord::default();
        for &field in self.order.iter().rev() {
            let size = geometry.size(field);
            let value = (rest % size) as u32;
            rest /= size;
            match field {
                Field::Rank => coord.rank = value,
                Field::Col => coord.col = value,
                Field::Bank => coord.bank = value,
            }
        }
        coord.row = rest;
        coord
    }
}

impl fmt::Display for AddrMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .order
            .iter()
            .map(|field| match field {
                Field::Rank => "rank",
                Field::Col => "col",
                Field::Bank => "bank",
            })
            .collect();
        f.write_str(&names.join(":"))
    }
}
