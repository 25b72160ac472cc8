//! Common utilities and types used throughout the memory controller model.
//!
//! This module provides fundamental building blocks that are shared across all components.
//! It includes:
//! 1. **Address Types:** Strong types for line and page addresses.
//! 2. **Constants:** Page size, line-size bounds and burst length.
//! 3. **Error Handling:** Configuration, protocol and controller error types.

/// Address type definitions (line and page addresses).
pub mod addr;

/// Common constants used throughout the model.
pub mod constants;

/// Error types.
pub mod error;

pub use addr::{LineAddr, PageAddr};
pub use constants::{PAGE_SIZE, lines_per_page};
pub use error::{ConfigError, ControllerError, ProtocolError};
