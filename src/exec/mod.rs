// src/exec/mod.rs

//! Execution layer.
//!
//! - [`pool`] provides the `WorkerPool` trait that regions submit chains to,
//!   the `ChainUnit` work item, and the production `TokioWorkerPool`.
//! - [`command`] provides `CommandElement`, a node body that runs a shell
//!   command.

pub mod command;
pub mod pool;

pub use command::CommandElement;
pub use pool::{ChainUnit, TokioWorkerPool, UnitFuture, WorkerPool};
