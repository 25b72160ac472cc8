//! Memory controller: request dispatch and address interleaving.
//!
//! This module organizes the controller and the pieces it composes:
//! 1. **Coherence:** Granted state per request type, and the clean-eviction bypass.
//! 2. **Bookkeeper:** Miss, compulsory-miss and page-footprint accounting.
//! 3. **Interleave:** Deterministic line-to-device mapping.
//! 4. **Routing:** Pool selection strategies.
//! 5. **Pool / Factory:** Backend pools and the device factory that fills them.
//! 6. **Controller:** The orchestrator tying the above together.

/// Miss and footprint bookkeeping.
pub mod bookkeeper;

/// Coherence resolution.
pub mod coherence;

/// The memory controller.
pub mod controller;

/// Backend device factory.
pub mod factory;

/// Line-to-device interleaving.
pub mod interleave;

/// Backend pools.
pub mod pool;

/// Pool selection strategies.
pub mod routing;

pub use bookkeeper::AccessBookkeeper;
pub use controller::{ControllerParams, MemoryController, Route};
pub use interleave::Interleaver;
pub use pool::BackendPool;
pub use routing::{PoolId, PoolSelector};
