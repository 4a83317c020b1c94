#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use regionflow::config::{ConfigFile, ConfigSection, NodeConfig, RawConfigFile};
use regionflow::dag::{Element, NodeSpec};
use regionflow::engine::Region;

use crate::elements::{ExecutionLog, FailingElement, RecordingElement};

/// Builder for `Region` to simplify test setup.
///
/// Nodes are recorded into a shared [`ExecutionLog`] when they run; edges are
/// declared by name, `from` being the dependency and `to` the dependent.
pub struct RegionBuilder {
    region: Region,
    log: ExecutionLog,
}

impl RegionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            region: Region::new(name),
            log: ExecutionLog::new(),
        }
    }

    /// Runnable, non-linkable recording node.
    pub fn node(self, name: &str) -> Self {
        let element = RecordingElement::new(name, self.log.clone());
        self.with_spec(NodeSpec::new(name, Arc::new(element)))
    }

    /// Runnable, linkable recording node.
    pub fn linkable(self, name: &str) -> Self {
        let element = RecordingElement::new(name, self.log.clone());
        self.with_spec(NodeSpec::new(name, Arc::new(element)).linkable(true))
    }

    /// Non-runnable placeholder.
    pub fn placeholder(self, name: &str) -> Self {
        let element = RecordingElement::new(name, self.log.clone());
        self.with_spec(NodeSpec::new(name, Arc::new(element)).runnable(false))
    }

    /// Runnable node whose body fails.
    pub fn failing(self, name: &str) -> Self {
        let element = FailingElement::new(name, self.log.clone());
        self.with_spec(NodeSpec::new(name, Arc::new(element)))
    }

    pub fn element(self, name: &str, element: Arc<dyn Element>) -> Self {
        self.with_spec(NodeSpec::new(name, element))
    }

    pub fn with_spec(mut self, spec: NodeSpec) -> Self {
        self.region.add_node(spec).expect("Failed to add node");
        self
    }

    /// `to` waits for `from`.
    pub fn edge(mut self, from: &str, to: &str) -> Self {
        let from = self.id(from);
        let to = self.id(to);
        self.region
            .add_dependency(to, from)
            .expect("Failed to add dependency");
        self
    }

    /// Edges between consecutive names.
    pub fn path(mut self, names: &[&str]) -> Self {
        for pair in names.windows(2) {
            self = self.edge(pair[0], pair[1]);
        }
        self
    }

    pub fn log(&self) -> ExecutionLog {
        self.log.clone()
    }

    pub fn build(self) -> Region {
        self.region
    }

    pub fn build_with_log(self) -> (Region, ExecutionLog) {
        (self.region, self.log)
    }

    fn id(&self, name: &str) -> regionflow::types::NodeId {
        self.region
            .node_id(name)
            .unwrap_or_else(|| panic!("unknown node '{name}' in test graph"))
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                node: BTreeMap::new(),
            },
        }
    }

    pub fn with_node(mut self, name: &str, node: NodeConfig) -> Self {
        self.config.node.insert(name.to_string(), node);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.config.config.name = name.to_string();
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.config.config.worker_threads = Some(threads);
        self
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.config.config.runs = runs;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
pub struct NodeConfigBuilder {
    node: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            node: NodeConfig {
                cmd: cmd.to_string(),
                after: vec![],
                runnable: true,
                linkable: false,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.node.after.push(dep.to_string());
        self
    }

    pub fn runnable(mut self, val: bool) -> Self {
        self.node.runnable = val;
        self
    }

    pub fn linkable(mut self, val: bool) -> Self {
        self.node.linkable = val;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}
