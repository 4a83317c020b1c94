// tests/layering_properties.rs

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use proptest::prelude::*;
use regionflow::engine::Region;
use regionflow::types::NodeId;
use regionflow_test_utils::builders::RegionBuilder;
use regionflow_test_utils::elements::ExecutionLog;
use regionflow_test_utils::inline_pool::InlinePool;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Plain,
    Linkable,
    Placeholder,
}

#[derive(Debug, Clone)]
struct GraphSpec {
    kinds: Vec<Kind>,
    /// `(dependency, dependent)` index pairs, always `dependency < dependent`.
    edges: Vec<(usize, usize)>,
}

// Acyclic by construction: node N may only depend on nodes 0..N-1.
fn graph_strategy(max_nodes: usize) -> impl Strategy<Value = GraphSpec> {
    (1..=max_nodes).prop_flat_map(|n| {
        let kinds = proptest::collection::vec(
            prop_oneof![
                4 => Just(Kind::Plain),
                4 => Just(Kind::Linkable),
                1 => Just(Kind::Placeholder),
            ],
            n,
        );
        let deps = proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n);

        (kinds, deps).prop_map(|(kinds, raw_deps)| {
            let mut edges = BTreeSet::new();
            for (i, potential) in raw_deps.into_iter().enumerate() {
                if i == 0 {
                    continue;
                }
                for dep in potential {
                    edges.insert((dep % i, i));
                }
            }
            GraphSpec {
                kinds,
                edges: edges.into_iter().collect(),
            }
        })
    })
}

fn name(i: usize) -> String {
    format!("n{i}")
}

fn build(spec: &GraphSpec) -> (Region, ExecutionLog) {
    let mut builder = RegionBuilder::new("prop");
    for (i, kind) in spec.kinds.iter().enumerate() {
        let n = name(i);
        builder = match kind {
            Kind::Plain => builder.node(&n),
            Kind::Linkable => builder.linkable(&n),
            Kind::Placeholder => builder.placeholder(&n),
        };
    }
    for &(from, to) in &spec.edges {
        builder = builder.edge(&name(from), &name(to));
    }
    builder.build_with_log()
}

proptest! {
    #[test]
    fn every_runnable_node_is_scheduled_exactly_once(spec in graph_strategy(12)) {
        let (mut region, _log) = build(&spec);
        region.init().unwrap();
        let registry = region.registry().unwrap();

        let mut seen: HashMap<NodeId, usize> = HashMap::new();
        for chain in region.schedule().chains() {
            for &id in chain.nodes() {
                *seen.entry(id).or_default() += 1;
            }
        }

        for node in registry.nodes() {
            let count = seen.get(&node.id()).copied().unwrap_or(0);
            if node.is_runnable() {
                prop_assert_eq!(count, 1, "node {} scheduled {} times", node.name(), count);
            } else {
                prop_assert_eq!(count, 0, "placeholder {} was scheduled", node.name());
            }
        }
    }

    #[test]
    fn chains_only_fold_linkable_single_successors(spec in graph_strategy(12)) {
        let (mut region, _log) = build(&spec);
        region.init().unwrap();
        let registry = region.registry().unwrap();

        for chain in region.schedule().chains() {
            for pair in chain.nodes().windows(2) {
                let (tail, next) = (registry.get(pair[0]).unwrap(), registry.get(pair[1]).unwrap());
                prop_assert_eq!(tail.successors(), &[pair[1]][..]);
                prop_assert!(next.is_linkable());
                prop_assert_eq!(next.dependency_count(), 1);
            }
        }
    }

    #[test]
    fn dependencies_land_in_earlier_layers_or_earlier_in_chain(spec in graph_strategy(12)) {
        let (mut region, _log) = build(&spec);
        region.init().unwrap();
        let registry = region.registry().unwrap();
        let schedule = region.schedule();

        for chain in schedule.chains() {
            for (pos, &id) in chain.nodes().iter().enumerate() {
                let layer = schedule.layer_of(id).unwrap();
                for &pred in registry.get(id).unwrap().predecessors() {
                    if !registry.get(pred).unwrap().is_runnable() {
                        continue;
                    }
                    let pred_layer = schedule.layer_of(pred).unwrap();
                    let earlier_in_chain = chain.nodes()[..pos].contains(&pred);
                    prop_assert!(
                        pred_layer < layer || earlier_in_chain,
                        "{} (layer {}) depends on {} (layer {})",
                        registry.get(id).unwrap().name(),
                        layer,
                        registry.get(pred).unwrap().name(),
                        pred_layer
                    );
                }
            }
        }
    }

    #[test]
    fn run_order_respects_dependencies(spec in graph_strategy(10)) {
        let (mut region, log) = build(&spec);
        let pool = InlinePool::new();
        region.set_worker_pool(Arc::new(pool.clone()));
        region.init().unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let summary = runtime.block_on(region.run()).unwrap();

        let registry = region.registry().unwrap();
        prop_assert_eq!(summary.nodes, registry.runnable_count());
        prop_assert_eq!(summary.units, region.schedule().chain_count());
        prop_assert_eq!(pool.unit_count(), summary.units);

        for &(from, to) in &spec.edges {
            let (from, to) = (name(from), name(to));
            if let (Some(a), Some(b)) = (log.position(&from), log.position(&to)) {
                prop_assert!(a < b, "{} ran after its dependent {}", from, to);
            }
        }
        for node in registry.nodes() {
            prop_assert_eq!(node.is_done(), node.is_runnable(), "node {}", node.name());
        }
    }
}
