// src/config/validate.rs

//! Checks a parsed region description before any region is built from it.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, ConfigSection, NodeConfig, RawConfigFile};
use crate::errors::{RegionflowError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RegionflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        if raw.node.is_empty() {
            return Err(invalid(
                "config must contain at least one [node.<name>] section".to_string(),
            ));
        }
        check_section(&raw.config)?;
        for (name, node) in &raw.node {
            check_node(name, node, &raw)?;
        }
        check_acyclic(&raw)?;

        Ok(ConfigFile::new_unchecked(raw.config, raw.node))
    }
}

fn invalid(msg: String) -> RegionflowError {
    RegionflowError::ConfigError(msg)
}

fn check_section(section: &ConfigSection) -> Result<()> {
    if section.runs == 0 {
        return Err(invalid("[config].runs must be >= 1 (got 0)".to_string()));
    }
    if section.worker_threads == Some(0) {
        return Err(invalid(
            "[config].worker_threads must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn check_node(name: &str, node: &NodeConfig, raw: &RawConfigFile) -> Result<()> {
    // Placeholders are never executed and may leave `cmd` out.
    if node.runnable && node.cmd.trim().is_empty() {
        return Err(invalid(format!(
            "node '{name}' is runnable but has an empty `cmd`"
        )));
    }

    if let Some(dep) = node.after.iter().find(|dep| dep.as_str() == name) {
        return Err(invalid(format!(
            "node '{dep}' cannot depend on itself in `after`"
        )));
    }
    if let Some(dep) = node.after.iter().find(|dep| !raw.node.contains_key(*dep)) {
        return Err(invalid(format!(
            "node '{name}' has unknown dependency '{dep}' in `after`"
        )));
    }
    Ok(())
}

/// Only edges matter here; a node with no `after` entries can't close a cycle.
fn check_acyclic(raw: &RawConfigFile) -> Result<()> {
    let edges = raw.node.iter().flat_map(|(name, node)| {
        node.after
            .iter()
            .map(move |dep| (dep.as_str(), name.as_str()))
    });
    let graph: DiGraphMap<&str, ()> = DiGraphMap::from_edges(edges);

    toposort(&graph, None).map(drop).map_err(|cycle| {
        RegionflowError::DagCycle(format!(
            "cycle detected in region graph involving node '{}'",
            cycle.node_id()
        ))
    })
}
