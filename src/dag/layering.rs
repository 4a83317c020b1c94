// src/dag/layering.rs

//! Breadth-first layering with chain collapsing.
//!
//! Turns a registry into a [`Schedule`]: an ordered list of layers, each a
//! set of chains that may run concurrently. Linear runs of linkable nodes are
//! folded into their predecessor's chain so they cost one submission instead
//! of one per node.
//!
//! A node is placed in the first layer after all of its runnable
//! predecessors have been placed. Nodes that can never be placed (cycles, or
//! anything depending on a cycle) are reported as a [`StructureError`].

use tracing::{debug, info};

use crate::dag::chain::Chain;
use crate::dag::registry::Registry;
use crate::errors::StructureError;
use crate::types::NodeId;

/// A set of mutually independent chains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layer {
    chains: Vec<Chain>,
}

impl Layer {
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.chains.iter().map(Chain::len).sum()
    }

    fn push(&mut self, chain: Chain) {
        self.chains.push(chain);
    }
}

/// Ordered layers computed once per region initialisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    layers: Vec<Layer>,
}

impl Schedule {
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn chain_count(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }

    pub fn node_count(&self) -> usize {
        self.layers.iter().map(Layer::node_count).sum()
    }

    pub fn chains(&self) -> impl Iterator<Item = &Chain> {
        self.layers.iter().flat_map(|layer| layer.chains.iter())
    }

    /// Layer index of the chain containing `id`, if it was scheduled.
    pub fn layer_of(&self, id: NodeId) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.chains.iter().any(|c| c.contains(id)))
    }

    /// Node names per chain per layer; handy for printing and assertions.
    pub fn describe(&self, registry: &Registry) -> Vec<Vec<Vec<String>>> {
        self.layers
            .iter()
            .map(|layer| {
                layer
                    .chains
                    .iter()
                    .map(|chain| {
                        chain
                            .names(registry)
                            .into_iter()
                            .map(str::to_string)
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }
}

/// Compute the schedule for every runnable node in `registry`.
pub fn build_schedule(registry: &Registry) -> Result<Schedule, StructureError> {
    let total = registry.len();
    let expected = registry.runnable_count();

    // Layer index each node was placed in.
    let mut placed: Vec<Option<usize>> = vec![None; total];
    let mut placed_count = 0usize;
    let mut layers: Vec<Layer> = Vec::new();

    let mut current = Layer::default();
    for node in registry.nodes() {
        if !node.is_runnable() || node.dependency_count() != 0 || placed[node.id().index()].is_some()
        {
            continue;
        }
        let chain = extend_chain(registry, node.id(), 0, &mut placed);
        placed_count += chain.len();
        current.push(chain);
    }

    while !current.is_empty() {
        if placed_count > total {
            return Err(StructureError::PlacementOverflow {
                placed: placed_count,
                total,
            });
        }

        let next_index = layers.len() + 1;
        let mut next = Layer::default();
        let mut proposed = vec![false; total];

        for chain in current.chains() {
            for &id in chain.nodes() {
                for &succ in registry.node(id).successors() {
                    let candidate = registry.node(succ);
                    if !candidate.is_runnable()
                        || placed[succ.index()].is_some()
                        || proposed[succ.index()]
                    {
                        continue;
                    }

                    let ready = candidate.predecessors().iter().all(|&pred| {
                        !registry.node(pred).is_runnable()
                            || placed[pred.index()].is_some_and(|layer| layer < next_index)
                    });
                    if !ready {
                        continue;
                    }

                    proposed[succ.index()] = true;
                    let chain = extend_chain(registry, succ, next_index, &mut placed);
                    placed_count += chain.len();
                    next.push(chain);
                }
            }
        }

        debug!(
            layer = layers.len(),
            chains = current.len(),
            nodes = current.node_count(),
            "layer built"
        );
        layers.push(current);
        current = next;
    }

    if placed_count != expected {
        let unplaced = registry
            .nodes()
            .filter(|n| n.is_runnable() && placed[n.id().index()].is_none())
            .map(|n| n.name().to_string())
            .collect();
        return Err(StructureError::Unplaced {
            placed: placed_count,
            expected,
            unplaced,
        });
    }

    let schedule = Schedule { layers };
    info!(
        layers = schedule.len(),
        chains = schedule.chain_count(),
        nodes = schedule.node_count(),
        "schedule built"
    );
    Ok(schedule)
}

/// Start a chain at `head` and fold in linkable single-successor runs.
///
/// The tail is extended while it has exactly one successor that is runnable,
/// linkable, still unplaced, and waits on nothing but the tail.
fn extend_chain(
    registry: &Registry,
    head: NodeId,
    layer: usize,
    placed: &mut [Option<usize>],
) -> Chain {
    let mut chain = Chain::new(head);
    placed[head.index()] = Some(layer);

    let mut tail = head;
    loop {
        let &[next] = registry.node(tail).successors() else {
            break;
        };
        let candidate = registry.node(next);
        let foldable = candidate.is_runnable()
            && candidate.is_linkable()
            && placed[next.index()].is_none()
            && candidate.dependency_count() == 1;
        if !foldable {
            break;
        }

        chain.push(next);
        placed[next.index()] = Some(layer);
        tail = next;
    }

    chain
}
