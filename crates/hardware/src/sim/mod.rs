//! Simulation drivers.
//!
//! Generates request streams and issues them against a controller from several requester
//! threads at once.

pub mod workload;

pub use workload::{Pattern, RunSummary, Workload};
