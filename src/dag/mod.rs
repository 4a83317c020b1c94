// src/dag/mod.rs

//! Region graph representation and static analysis.
//!
//! - [`node`] holds node records, the [`Element`] trait and dependency
//!   bookkeeping.
//! - [`registry`] owns the arena of nodes for one region.
//! - [`chain`] defines chains, the minimum unit submitted for execution.
//! - [`layering`] turns a registry into an ordered [`Schedule`] of layers.

pub mod chain;
pub mod layering;
pub mod node;
pub mod registry;

pub use chain::Chain;
pub use layering::{Layer, Schedule, build_schedule};
pub use node::{DependencyState, Element, Node, NodeSpec};
pub use registry::{Registry, RunClaim};
