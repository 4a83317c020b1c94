// src/dag/node.rs

//! Node records and the element trait they execute.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use tracing::warn;

use crate::types::NodeId;

/// The behaviour behind a node.
///
/// Hooks run synchronously on whichever worker thread executes the node's
/// chain. Only `run` is skipped in mock mode; the other hooks always run.
pub trait Element: Send + Sync {
    /// Called once when the owning registry is initialised.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn before_run(&self) -> Result<()> {
        Ok(())
    }

    /// The node's main work body.
    fn run(&self) -> Result<()>;

    fn after_run(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the owning registry is torn down.
    fn deinit(&self) -> Result<()> {
        Ok(())
    }
}

/// Dependency bookkeeping for one schedulable unit.
///
/// `remaining` is reset to `dependency_count` at the start of every run and
/// counts down as predecessors complete; it reaches zero exactly when every
/// predecessor has finished.
#[derive(Debug, Default)]
pub struct DependencyState {
    dependency_count: AtomicUsize,
    remaining: AtomicUsize,
    done: AtomicBool,
}

impl DependencyState {
    pub fn new(dependency_count: usize) -> Self {
        Self {
            dependency_count: AtomicUsize::new(dependency_count),
            remaining: AtomicUsize::new(dependency_count),
            done: AtomicBool::new(false),
        }
    }

    pub fn dependency_count(&self) -> usize {
        self.dependency_count.load(Ordering::Acquire)
    }

    pub fn set_dependency_count(&self, count: usize) {
        self.dependency_count.store(count, Ordering::Release);
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.remaining() == 0
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Prepare for a fresh run.
    pub fn reset(&self) {
        self.remaining
            .store(self.dependency_count(), Ordering::Release);
        self.done.store(false, Ordering::Release);
    }

    pub fn clear_done(&self) {
        self.done.store(false, Ordering::Release);
    }

    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// One predecessor finished. Saturates at zero and returns the new count.
    ///
    /// `remaining` must reach zero exactly once per run, so a decrement past
    /// zero is logged as a warning.
    pub fn satisfy_one(&self) -> usize {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                warn!(
                    dependency_count = self.dependency_count(),
                    "dependency satisfied more often than it was counted"
                );
                0
            }
        }
    }
}

/// What the graph builder hands to a region for each node.
#[derive(Clone)]
pub struct NodeSpec {
    name: String,
    runnable: bool,
    linkable: bool,
    element: Arc<dyn Element>,
}

impl NodeSpec {
    /// A runnable, non-linkable node.
    pub fn new(name: impl Into<String>, element: Arc<dyn Element>) -> Self {
        Self {
            name: name.into(),
            runnable: true,
            linkable: false,
            element,
        }
    }

    pub fn runnable(mut self, runnable: bool) -> Self {
        self.runnable = runnable;
        self
    }

    pub fn linkable(mut self, linkable: bool) -> Self {
        self.linkable = linkable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_runnable(&self) -> bool {
        self.runnable
    }

    pub fn is_linkable(&self) -> bool {
        self.linkable
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("runnable", &self.runnable)
            .field("linkable", &self.linkable)
            .finish_non_exhaustive()
    }
}

/// A node as stored in a registry's arena.
pub struct Node {
    id: NodeId,
    name: String,
    runnable: bool,
    linkable: bool,
    /// Nodes that wait for this one.
    successors: Vec<NodeId>,
    /// Nodes this one waits for.
    predecessors: Vec<NodeId>,
    state: DependencyState,
    element: Arc<dyn Element>,
}

impl Node {
    pub(crate) fn from_spec(
        id: NodeId,
        spec: &NodeSpec,
        successors: Vec<NodeId>,
        predecessors: Vec<NodeId>,
        dependency_count: usize,
    ) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            runnable: spec.runnable,
            linkable: spec.linkable,
            successors,
            predecessors,
            state: DependencyState::new(dependency_count),
            element: Arc::clone(&spec.element),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_runnable(&self) -> bool {
        self.runnable
    }

    pub fn is_linkable(&self) -> bool {
        self.linkable
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    /// Static in-degree, counted over runnable predecessors.
    pub fn dependency_count(&self) -> usize {
        self.state.dependency_count()
    }

    pub fn remaining_dependencies(&self) -> usize {
        self.state.remaining()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    pub fn element(&self) -> &dyn Element {
        self.element.as_ref()
    }

    pub(crate) fn state(&self) -> &DependencyState {
        &self.state
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("runnable", &self.runnable)
            .field("linkable", &self.linkable)
            .field("successors", &self.successors)
            .field("predecessors", &self.predecessors)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
