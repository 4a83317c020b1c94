// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Region description as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// name = "build"
/// worker_threads = 4
/// runs = 1
///
/// [node.fetch]
/// cmd = "echo fetch"
///
/// [node.unpack]
/// cmd = "echo unpack"
/// after = ["fetch"]
/// linkable = true
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All nodes from `[node.<name>]`, keyed by node name.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,
}

/// A validated region description.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on dependencies being known and acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub node: BTreeMap<String, NodeConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, node: BTreeMap<String, NodeConfig>) -> Self {
        Self { config, node }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Region name used in logs.
    #[serde(default = "default_region_name")]
    pub name: String,

    /// Upper bound on threads executing chains concurrently.
    ///
    /// If `None`, the runtime's default blocking pool size is used.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// How many times the region is run after initialisation.
    #[serde(default = "default_runs")]
    pub runs: usize,
}

fn default_region_name() -> String {
    "region".to_string()
}

fn default_runs() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            name: default_region_name(),
            worker_threads: None,
            runs: default_runs(),
        }
    }
}

/// `[node.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// The command to execute. May be empty for placeholders.
    #[serde(default)]
    pub cmd: String,

    /// Nodes that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Placeholders (`runnable = false`) are kept in the graph but never run.
    #[serde(default = "default_true")]
    pub runnable: bool,

    /// Whether this node may be folded into its predecessor's chain.
    #[serde(default)]
    pub linkable: bool,
}

fn default_true() -> bool {
    true
}
