// src/errors.rs

//! Crate-wide error types.
//!
//! - [`RegionflowError`] is what the config loader and the CLI surface.
//! - [`RegionError`] is the scheduler taxonomy: precondition, structural,
//!   execution and consistency errors.

use std::fmt;

use thiserror::Error;

use crate::types::NodeId;

#[derive(Error, Debug)]
pub enum RegionflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in region graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RegionflowError>;

/// Lifecycle hook of an element, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Init,
    BeforeRun,
    Run,
    AfterRun,
    Deinit,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::Init => "init",
            Hook::BeforeRun => "before_run",
            Hook::Run => "run",
            Hook::AfterRun => "after_run",
            Hook::Deinit => "deinit",
        };
        f.write_str(name)
    }
}

/// A node's hook returned an error.
#[derive(Error, Debug)]
#[error("node '{node}' failed during {hook}: {source:#}")]
pub struct NodeFailure {
    pub node: String,
    pub hook: Hook,
    #[source]
    pub source: anyhow::Error,
}

/// The layering pass could not turn the graph into a valid schedule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error(
        "placed {placed} of {expected} runnable nodes; cycle or malformed graph involving {unplaced:?}"
    )]
    Unplaced {
        placed: usize,
        expected: usize,
        unplaced: Vec<String>,
    },

    #[error("placed {placed} nodes but the region only holds {total}")]
    PlacementOverflow { placed: usize, total: usize },

    #[error("node '{node}' still waits on {remaining} dependencies when its chain is processed")]
    OutOfOrder { node: String, remaining: usize },
}

/// Post-run bookkeeping did not add up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("submitted {submitted} nodes but the region holds {expected} runnable nodes")]
    NodeCount { submitted: usize, expected: usize },

    #[error("chain headed by '{head}' did not complete")]
    ChainIncomplete { head: String },
}

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("region '{region}' is not initialized")]
    NotInitialized { region: String },

    #[error("region '{region}' is already initialized")]
    AlreadyInitialized { region: String },

    #[error("region '{region}' has no worker pool attached")]
    MissingWorkerPool { region: String },

    #[error("region '{region}' is still referenced by in-flight work")]
    InUse { region: String },

    #[error("node '{0}' was already added to this region")]
    DuplicateNode(String),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("registry is already claimed by run token {active}")]
    Busy { active: u64 },

    #[error("mutation with run token {presented} but registry is owned by {owner}")]
    OwnershipViolation { presented: u64, owner: u64 },

    #[error("node '{node}' started with {remaining} unfinished dependencies")]
    NotReady { node: String, remaining: usize },

    #[error("structural error: {0}")]
    Structure(#[from] StructureError),

    #[error("execution error: {failure}")]
    Execution {
        #[source]
        failure: NodeFailure,
        /// Outcome of the post-run consistency check, if it also failed.
        consistency: Option<ConsistencyError>,
    },

    #[error("lifecycle error: {0}")]
    Lifecycle(#[source] NodeFailure),

    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("worker pool error: {0}")]
    Pool(String),
}

impl RegionError {
    /// Wrap a failure raised while a chain was executing.
    pub fn execution(failure: NodeFailure) -> Self {
        RegionError::Execution {
            failure,
            consistency: None,
        }
    }

    /// Consistency failure that accompanied this error, if any.
    pub fn consistency(&self) -> Option<&ConsistencyError> {
        match self {
            RegionError::Execution { consistency, .. } => consistency.as_ref(),
            RegionError::Consistency(err) => Some(err),
            _ => None,
        }
    }
}
