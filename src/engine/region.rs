// src/engine/region.rs

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::{DependencyState, Element, NodeSpec, Registry, RunClaim, Schedule, build_schedule};
use crate::engine::RunSummary;
use crate::errors::{ConsistencyError, Hook, NodeFailure, RegionError, StructureError};
use crate::exec::{ChainUnit, CommandElement, WorkerPool};
use crate::types::{ExecMode, NodeId, RunToken};

/// Scheduler and executor for one subgraph of nodes.
///
/// A region is built empty, receives nodes and dependencies while
/// uninitialised, computes its [`Schedule`] once in [`Region::init`], and can
/// then be [`run`](Region::run) any number of times until
/// [`deinit`](Region::deinit).
///
/// Regions are move-only. To share one (for example to nest it inside an
/// outer region) wrap it in an `Arc` after initialisation; all run-time
/// operations take `&self`.
pub struct Region {
    name: String,
    specs: Vec<NodeSpec>,
    /// `(dependency, dependent)` pairs.
    edges: Vec<(NodeId, NodeId)>,
    /// Nodes in the order they were added; the boundary for before/after hooks.
    elements: Vec<NodeId>,
    registry: Option<Arc<Registry>>,
    schedule: Schedule,
    pool: Option<Arc<dyn WorkerPool>>,
    initialized: bool,
    /// This region's own counters when it is treated as a node of an outer graph.
    boundary: Arc<DependencyState>,
    /// Counters of outer nodes that wait for this region.
    dependents: Vec<Arc<DependencyState>>,
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("nodes", &self.specs.len())
            .field("initialized", &self.initialized)
            .field("schedule", &self.schedule)
            .field("has_pool", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specs: Vec::new(),
            edges: Vec::new(),
            elements: Vec::new(),
            registry: None,
            schedule: Schedule::default(),
            pool: None,
            initialized: false,
            boundary: Arc::new(DependencyState::default()),
            dependents: Vec::new(),
        }
    }

    /// Build an uninitialised region from a validated [`ConfigFile`].
    ///
    /// Every `[node.<name>]` becomes a [`CommandElement`]; `after = [...]`
    /// entries become dependencies.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self, RegionError> {
        let mut region = Region::new(cfg.config.name.clone());

        for (name, node) in cfg.node.iter() {
            let spec = NodeSpec::new(name.clone(), Arc::new(CommandElement::new(name, &node.cmd)))
                .runnable(node.runnable)
                .linkable(node.linkable);
            region.add_node(spec)?;
        }

        for (name, node) in cfg.node.iter() {
            for dep in node.after.iter() {
                let (Some(from), Some(to)) = (region.node_id(dep), region.node_id(name)) else {
                    continue;
                };
                region.add_dependency(to, from)?;
            }
        }

        Ok(region)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Attach the worker pool chains are submitted to.
    pub fn set_worker_pool(&mut self, pool: Arc<dyn WorkerPool>) {
        self.pool = Some(pool);
    }

    pub fn with_worker_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.set_worker_pool(pool);
        self
    }

    /// Add a node. Only allowed before [`Region::init`]; names must be unique.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeId, RegionError> {
        self.ensure_uninitialized()?;
        if self.node_id(spec.name()).is_some() {
            return Err(RegionError::DuplicateNode(spec.name().to_string()));
        }

        let id = NodeId(self.specs.len());
        debug!(region = %self.name, node = %spec.name(), %id, "node added");
        self.specs.push(spec);
        self.elements.push(id);
        Ok(id)
    }

    /// Record that `node` must wait for `depends_on`.
    pub fn add_dependency(&mut self, node: NodeId, depends_on: NodeId) -> Result<(), RegionError> {
        self.ensure_uninitialized()?;
        for id in [node, depends_on] {
            if id.index() >= self.specs.len() {
                return Err(RegionError::UnknownNode(id));
            }
        }
        self.edges.push((depends_on, node));
        Ok(())
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.specs
            .iter()
            .position(|spec| spec.name() == name)
            .map(NodeId)
    }

    /// Number of nodes explicitly added to this region.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// The schedule computed by the last successful `init`.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_deref()
    }

    /// Whether every added node finished in the latest run.
    pub fn is_done(&self) -> bool {
        match &self.registry {
            Some(registry) => self
                .elements
                .iter()
                .all(|&id| registry.node(id).is_done()),
            None => false,
        }
    }

    /// Static in-degree of this region when embedded in an outer graph.
    pub fn dependency_count(&self) -> usize {
        self.boundary.dependency_count()
    }

    pub fn set_dependency_count(&self, count: usize) {
        self.boundary.set_dependency_count(count);
    }

    pub fn remaining_dependencies(&self) -> usize {
        self.boundary.remaining()
    }

    /// Handle to this region's own counters, for outer graphs to decrement.
    pub fn dependency_state(&self) -> Arc<DependencyState> {
        Arc::clone(&self.boundary)
    }

    /// Register an outer node (or region) that waits for this region.
    pub fn add_dependent(&mut self, dependent: Arc<DependencyState>) -> Result<(), RegionError> {
        self.ensure_uninitialized()?;
        self.dependents.push(dependent);
        Ok(())
    }

    /// Whether this region finished as a node of an outer graph.
    pub fn boundary_done(&self) -> bool {
        self.boundary.is_done()
    }

    /// Build the registry, initialise every element and compute the schedule.
    ///
    /// The region stays uninitialised on any failure. Every element whose
    /// `init` hook succeeded has its `deinit` hook run before returning,
    /// whether a later `init` hook or the analysis failed.
    pub fn init(&mut self) -> Result<(), RegionError> {
        self.ensure_uninitialized()?;

        let mut registry = Registry::build(&self.specs, &self.edges);
        registry.init()?;

        let schedule = match Self::analyse(&registry) {
            Ok(schedule) => schedule,
            Err(err) => {
                warn!(region = %self.name, error = %err, "analysis failed");
                if let Err(deinit_err) = registry.deinit() {
                    warn!(region = %self.name, error = %deinit_err, "deinit after failed analysis also failed");
                }
                return Err(err);
            }
        };

        info!(
            region = %self.name,
            nodes = registry.len(),
            layers = schedule.len(),
            chains = schedule.chain_count(),
            "region initialised"
        );

        self.registry = Some(Arc::new(registry));
        self.schedule = schedule;
        self.initialized = true;
        Ok(())
    }

    /// Layer the graph, then dry-run the schedule in mock mode to check that
    /// every chain's dependencies are met by the layers before it.
    fn analyse(registry: &Registry) -> Result<Schedule, RegionError> {
        let schedule = build_schedule(registry)?;

        let claim = RunClaim::acquire(registry)?;
        let token = claim.token();
        registry.reset_for_run(token)?;

        for layer in schedule.layers() {
            for chain in layer.chains() {
                chain
                    .process(registry, token, ExecMode::Mock)
                    .map_err(|err| match err {
                        RegionError::NotReady { node, remaining } => {
                            RegionError::Structure(StructureError::OutOfOrder { node, remaining })
                        }
                        other => other,
                    })?;
            }
        }

        registry.reset_for_run(token)?;
        Ok(schedule)
    }

    /// Tear down the registry and forget the schedule.
    ///
    /// Calling this on an uninitialised region does nothing. The node specs
    /// are kept, so the region can be initialised again.
    pub fn deinit(&mut self) -> Result<(), RegionError> {
        let Some(registry) = self.registry.take() else {
            return Ok(());
        };

        let mut registry = match Arc::try_unwrap(registry) {
            Ok(registry) => registry,
            Err(shared) => {
                self.registry = Some(shared);
                return Err(RegionError::InUse {
                    region: self.name.clone(),
                });
            }
        };

        self.schedule = Schedule::default();
        self.initialized = false;
        let result = registry.deinit();
        info!(region = %self.name, ok = result.is_ok(), "region deinitialised");
        result
    }

    /// Execute the schedule once.
    ///
    /// Layers run strictly in order with a full barrier between them. Every
    /// chain submitted for a layer is awaited before returning, even after a
    /// failure; only the first failure is reported. The post-run consistency
    /// check always runs; an execution error takes precedence over it.
    pub async fn run(&self) -> Result<RunSummary, RegionError> {
        let (registry, pool) = self.run_preconditions()?;
        let claim = RunClaim::acquire(registry)?;
        self.run_claimed(registry, pool, claim.token()).await
    }

    async fn run_claimed(
        &self,
        registry: &Arc<Registry>,
        pool: &Arc<dyn WorkerPool>,
        token: RunToken,
    ) -> Result<RunSummary, RegionError> {
        registry.reset_for_run(token)?;
        info!(region = %self.name, %token, layers = self.schedule.len(), "region run started");

        let mut summary = RunSummary::default();
        let mut submitted = 0usize;
        let mut first_failure: Option<RegionError> = None;

        for (index, layer) in self.schedule.layers().iter().enumerate() {
            let mut pending = Vec::with_capacity(layer.len());
            for chain in layer.chains() {
                let unit = ChainUnit::new(Arc::clone(registry), chain.clone(), token, ExecMode::Run);
                submitted += chain.len();
                pending.push((chain.head(), pool.submit(unit)));
            }
            summary.layers += 1;
            summary.units += pending.len();
            debug!(region = %self.name, layer = index, units = pending.len(), "layer submitted");

            for (head, handle) in pending {
                match handle.await {
                    Ok(completed) => summary.nodes += completed,
                    Err(err) => {
                        warn!(
                            region = %self.name,
                            layer = index,
                            head = %registry.node(head).name(),
                            error = %err,
                            "chain failed"
                        );
                        first_failure.get_or_insert(err);
                    }
                }
            }

            if first_failure.is_some() {
                break;
            }
        }

        let consistency = self.check_final_status(registry, submitted);

        match (first_failure, consistency) {
            (None, Ok(())) => {
                info!(
                    region = %self.name,
                    layers = summary.layers,
                    units = summary.units,
                    nodes = summary.nodes,
                    "region run finished"
                );
                Ok(summary)
            }
            (None, Err(err)) => Err(RegionError::Consistency(err)),
            (Some(RegionError::Execution { failure, .. }), consistency) => {
                Err(RegionError::Execution {
                    failure,
                    consistency: consistency.err(),
                })
            }
            (Some(other), consistency) => {
                if let Err(err) = consistency {
                    warn!(region = %self.name, error = %err, "consistency check failed after run error");
                }
                Err(other)
            }
        }
    }

    /// Every runnable node must have been submitted exactly once, and every
    /// chain must have finished.
    fn check_final_status(&self, registry: &Registry, submitted: usize) -> Result<(), ConsistencyError> {
        let expected = registry.runnable_count();
        if submitted != expected {
            return Err(ConsistencyError::NodeCount {
                submitted,
                expected,
            });
        }

        for chain in self.schedule.chains() {
            if !chain.is_done(registry) {
                return Err(ConsistencyError::ChainIncomplete {
                    head: registry.node(chain.head()).name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Prepare for a fresh run as a node of an outer graph: clear the `done`
    /// flag of every added node, call each element's `before_run` hook and
    /// reset this region's own counter.
    pub fn before_run(&self) -> Result<(), RegionError> {
        let registry = self.initialized_registry()?;
        let claim = RunClaim::acquire(registry)?;
        self.before_run_claimed(registry, claim.token())
    }

    fn before_run_claimed(&self, registry: &Registry, token: RunToken) -> Result<(), RegionError> {
        registry.clear_done(&self.elements, token)?;
        self.each_element_hook(registry, Hook::BeforeRun, |e| e.before_run())?;
        self.boundary.reset();
        Ok(())
    }

    /// Finish as a node of an outer graph: call each element's `after_run`
    /// hook, release one dependency on every registered dependent and mark
    /// this region done.
    pub fn after_run(&self) -> Result<(), RegionError> {
        let registry = self.initialized_registry()?;
        let _claim = RunClaim::acquire(registry)?;
        self.after_run_claimed(registry)
    }

    fn after_run_claimed(&self, registry: &Registry) -> Result<(), RegionError> {
        self.each_element_hook(registry, Hook::AfterRun, |e| e.after_run())?;
        for dependent in &self.dependents {
            dependent.satisfy_one();
        }
        self.boundary.mark_done();
        debug!(region = %self.name, dependents = self.dependents.len(), "region boundary completed");
        Ok(())
    }

    /// Call one boundary hook on every added element, in insertion order,
    /// stopping at the first failure.
    fn each_element_hook<F>(
        &self,
        registry: &Registry,
        hook: Hook,
        call: F,
    ) -> Result<(), RegionError>
    where
        F: Fn(&dyn Element) -> anyhow::Result<()>,
    {
        for &id in &self.elements {
            let node = registry.node(id);
            call(node.element()).map_err(|source| {
                RegionError::Lifecycle(NodeFailure {
                    node: node.name().to_string(),
                    hook,
                    source,
                })
            })?;
        }
        Ok(())
    }

    /// Full boundary lifecycle under one claim: `before_run`, the run itself
    /// unless `mode` is [`ExecMode::Mock`], then `after_run`.
    pub async fn process(&self, mode: ExecMode) -> Result<(), RegionError> {
        let registry = self.initialized_registry()?;
        let pool = match mode {
            ExecMode::Run => Some(self.run_preconditions()?.1),
            ExecMode::Mock => None,
        };
        let claim = RunClaim::acquire(registry)?;
        let token = claim.token();

        self.before_run_claimed(registry, token)?;
        if let Some(pool) = pool {
            self.run_claimed(registry, pool, token).await?;
        }
        self.after_run_claimed(registry)
    }

    fn ensure_uninitialized(&self) -> Result<(), RegionError> {
        if self.initialized {
            return Err(RegionError::AlreadyInitialized {
                region: self.name.clone(),
            });
        }
        Ok(())
    }

    fn initialized_registry(&self) -> Result<&Arc<Registry>, RegionError> {
        match (&self.registry, self.initialized) {
            (Some(registry), true) => Ok(registry),
            _ => Err(RegionError::NotInitialized {
                region: self.name.clone(),
            }),
        }
    }

    fn run_preconditions(&self) -> Result<(&Arc<Registry>, &Arc<dyn WorkerPool>), RegionError> {
        let registry = self.initialized_registry()?;
        let pool = self.pool.as_ref().ok_or_else(|| RegionError::MissingWorkerPool {
            region: self.name.clone(),
        })?;
        Ok((registry, pool))
    }
}
