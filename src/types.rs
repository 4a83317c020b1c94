// src/types.rs

//! Small shared value types: node identifiers, execution modes and run tokens.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Dense index of a node inside a region's arena.
///
/// Edges between nodes are always stored as `NodeId`s, never as references,
/// so a registry can be moved or shared without dangling links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a chain processes its nodes.
///
/// - `Run`: lifecycle hooks and the node body are executed.
/// - `Mock`: only the lifecycle hooks run; the body is skipped. Used while
///   analysing a region to validate the schedule without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    #[default]
    Run,
    Mock,
}

impl ExecMode {
    pub fn is_mock(self) -> bool {
        matches!(self, ExecMode::Mock)
    }
}

impl FromStr for ExecMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "run" => Ok(ExecMode::Run),
            "mock" => Ok(ExecMode::Mock),
            other => Err(format!(
                "invalid exec mode: {other} (expected \"run\" or \"mock\")"
            )),
        }
    }
}

/// Source of unique run tokens. Zero is reserved for "unclaimed".
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one exclusive claim on a registry.
///
/// Every mutation of per-run node state presents the token of the claim it
/// belongs to; a registry rejects mutations carrying any other token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunToken(u64);

impl RunToken {
    /// Allocate a fresh, process-unique token.
    pub fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}
