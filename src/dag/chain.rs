// src/dag/chain.rs

//! Chains: linear runs of nodes executed back to back as one unit.

use tracing::{debug, trace};

use crate::dag::node::Node;
use crate::dag::registry::Registry;
use crate::errors::{Hook, NodeFailure, RegionError};
use crate::types::{ExecMode, NodeId, RunToken};

/// An ordered run of nodes with no internal branching.
///
/// Every member after the head is the single successor of the member before
/// it and is linkable. A chain is the smallest unit handed to a worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    nodes: Vec<NodeId>,
}

impl Chain {
    pub fn new(head: NodeId) -> Self {
        Self { nodes: vec![head] }
    }

    pub(crate) fn push(&mut self, id: NodeId) {
        self.nodes.push(id);
    }

    pub fn head(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Member names, in execution order.
    pub fn names<'r>(&self, registry: &'r Registry) -> Vec<&'r str> {
        self.nodes.iter().map(|&id| registry.node(id).name()).collect()
    }

    /// Run every member in order and return how many completed.
    ///
    /// Stops at the first failure and returns it; earlier members stay
    /// completed. A member that still has unfinished dependencies is reported
    /// as [`RegionError::NotReady`] without running any of its hooks. Nothing
    /// runs unless `token` owns the registry.
    pub fn process(
        &self,
        registry: &Registry,
        token: RunToken,
        mode: ExecMode,
    ) -> Result<usize, RegionError> {
        registry.check_owner(token)?;
        let mut completed = 0;

        for &id in &self.nodes {
            let node = registry.node(id);
            let remaining = node.remaining_dependencies();
            if remaining != 0 {
                return Err(RegionError::NotReady {
                    node: node.name().to_string(),
                    remaining,
                });
            }

            trace!(node = %node.name(), ?mode, "processing node");
            node.element().before_run().map_err(failed(node, Hook::BeforeRun))?;
            if !mode.is_mock() {
                node.element().run().map_err(failed(node, Hook::Run))?;
            }
            node.element().after_run().map_err(failed(node, Hook::AfterRun))?;

            registry.complete(id, token)?;
            completed += 1;
        }

        debug!(
            head = %registry.node(self.head()).name(),
            completed,
            ?mode,
            "chain processed"
        );
        Ok(completed)
    }

    /// Whether every member has finished in the current run.
    pub fn is_done(&self, registry: &Registry) -> bool {
        self.nodes.iter().all(|&id| registry.node(id).is_done())
    }
}

fn failed(node: &Node, hook: Hook) -> impl FnOnce(anyhow::Error) -> RegionError + '_ {
    move |source| {
        RegionError::execution(NodeFailure {
            node: node.name().to_string(),
            hook,
            source,
        })
    }
}
