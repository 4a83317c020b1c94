// src/engine/mod.rs

//! Region orchestration.
//!
//! - [`region`] holds [`Region`], which analyses its node set into a
//!   schedule at `init` and drives that schedule through a worker pool with a
//!   full barrier between layers.
//! - [`nested`] wraps an initialised region as an [`Element`](crate::dag::Element)
//!   so it can be scheduled as a single node of an outer region.

pub mod nested;
pub mod region;

pub use nested::NestedRegion;
pub use region::Region;

/// Counters reported by a successful [`Region::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Layers whose chains were submitted.
    pub layers: usize,
    /// Chains submitted to the worker pool.
    pub units: usize,
    /// Nodes that completed.
    pub nodes: usize,
}
