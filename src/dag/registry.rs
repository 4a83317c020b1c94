// src/dag/registry.rs

//! The arena of nodes belonging to one region.
//!
//! The registry owns node records, wires successor/predecessor indices, runs
//! the `init` / `deinit` element hooks, and guards every per-run mutation with
//! a [`RunToken`] so two runs can never interleave on the same nodes.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::dag::node::{Node, NodeSpec};
use crate::errors::{Hook, NodeFailure, RegionError};
use crate::types::{NodeId, RunToken};

const UNCLAIMED: u64 = 0;

#[derive(Debug)]
pub struct Registry {
    nodes: Vec<Node>,
    /// Token of the run currently allowed to mutate node state.
    owner: AtomicU64,
    initialized: bool,
}

impl Registry {
    /// Build the arena from node specs and `(dependency, dependent)` edges.
    ///
    /// Duplicate edges collapse into one. Edge endpoints must be valid
    /// indices into `specs`; the region checks this when edges are added.
    pub fn build(specs: &[NodeSpec], edges: &[(NodeId, NodeId)]) -> Self {
        let mut successors: Vec<Vec<NodeId>> = vec![Vec::new(); specs.len()];
        let mut predecessors: Vec<Vec<NodeId>> = vec![Vec::new(); specs.len()];

        for &(from, to) in edges {
            if successors[from.index()].contains(&to) {
                continue;
            }
            successors[from.index()].push(to);
            predecessors[to.index()].push(from);
        }

        let nodes = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let preds = std::mem::take(&mut predecessors[index]);
                let dependency_count = preds
                    .iter()
                    .filter(|p| specs[p.index()].is_runnable())
                    .count();
                Node::from_spec(
                    NodeId(index),
                    spec,
                    std::mem::take(&mut successors[index]),
                    preds,
                    dependency_count,
                )
            })
            .collect();

        Self {
            nodes,
            owner: AtomicU64::new(UNCLAIMED),
            initialized: false,
        }
    }

    /// Run every element's `init` hook, stopping at the first failure.
    ///
    /// Elements initialised before the failing one are deinitialised again,
    /// in order, so a failed `init` leaves nothing half set up.
    pub fn init(&mut self) -> Result<(), RegionError> {
        for (index, node) in self.nodes.iter().enumerate() {
            if let Err(source) = node.element().init() {
                for earlier in &self.nodes[..index] {
                    if let Err(err) = earlier.element().deinit() {
                        warn!(node = %earlier.name(), error = %err, "rollback deinit failed");
                    }
                }
                return Err(RegionError::Lifecycle(NodeFailure {
                    node: node.name().to_string(),
                    hook: Hook::Init,
                    source,
                }));
            }
        }
        self.initialized = true;
        debug!(nodes = self.nodes.len(), "registry initialised");
        Ok(())
    }

    /// Run every element's `deinit` hook.
    ///
    /// All hooks run even if one fails; the first failure is returned. A
    /// second call without an intervening `init` does nothing.
    pub fn deinit(&mut self) -> Result<(), RegionError> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut first_error = None;
        for node in &self.nodes {
            if let Err(source) = node.element().deinit() {
                warn!(node = %node.name(), error = %source, "deinit hook failed");
                first_error.get_or_insert(RegionError::Lifecycle(NodeFailure {
                    node: node.name().to_string(),
                    hook: Hook::Deinit,
                    source,
                }));
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn runnable_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_runnable()).count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Index a node whose id came from this registry's own edges or schedule.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Claim exclusive mutation rights for `token`.
    pub fn claim(&self, token: RunToken) -> Result<(), RegionError> {
        self.owner
            .compare_exchange(
                UNCLAIMED,
                token.get(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|active| RegionError::Busy { active })
    }

    /// Drop the claim held by `token`. Releasing someone else's claim is a no-op.
    pub fn release(&self, token: RunToken) {
        let _ = self.owner.compare_exchange(
            token.get(),
            UNCLAIMED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn check_owner(&self, token: RunToken) -> Result<(), RegionError> {
        let owner = self.owner.load(Ordering::Acquire);
        if owner == token.get() {
            Ok(())
        } else {
            Err(RegionError::OwnershipViolation {
                presented: token.get(),
                owner,
            })
        }
    }

    /// Reset every node's counters and `done` flag for a fresh run.
    pub fn reset_for_run(&self, token: RunToken) -> Result<(), RegionError> {
        self.check_owner(token)?;
        for node in &self.nodes {
            node.state().reset();
        }
        Ok(())
    }

    /// Clear the `done` flag of the given nodes.
    pub fn clear_done(&self, ids: &[NodeId], token: RunToken) -> Result<(), RegionError> {
        self.check_owner(token)?;
        for &id in ids {
            self.node(id).state().clear_done();
        }
        Ok(())
    }

    /// Mark `id` done and release one dependency on each of its successors.
    pub fn complete(&self, id: NodeId, token: RunToken) -> Result<(), RegionError> {
        self.check_owner(token)?;
        let node = self.node(id);
        node.state().mark_done();
        for &succ in node.successors() {
            let successor = self.node(succ);
            if !successor.is_runnable() {
                continue;
            }
            let left = successor.state().satisfy_one();
            debug!(node = %node.name(), successor = %successor.name(), left, "dependency released");
        }
        Ok(())
    }
}

/// RAII claim on a registry: released when dropped.
#[derive(Debug)]
pub struct RunClaim<'a> {
    registry: &'a Registry,
    token: RunToken,
}

impl<'a> RunClaim<'a> {
    pub fn acquire(registry: &'a Registry) -> Result<Self, RegionError> {
        let token = RunToken::next();
        registry.claim(token)?;
        Ok(Self { registry, token })
    }

    pub fn token(&self) -> RunToken {
        self.token
    }
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        self.registry.release(self.token);
    }
}
