// src/engine/nested.rs

//! Regions embedded as single nodes of an outer region.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::runtime::Handle;
use tracing::debug;

use crate::dag::Element;
use crate::engine::Region;
use crate::types::ExecMode;

/// An initialised region exposed as an [`Element`].
///
/// Running the element drives the inner region's whole boundary lifecycle
/// (`before_run`, run, `after_run`) on the calling worker thread. The inner
/// run is async, so it is driven with [`Handle::block_on`]; the outer pool
/// must therefore execute chains off the async worker threads, which
/// [`TokioWorkerPool`](crate::exec::TokioWorkerPool) does.
///
/// While the inner region runs, the outer chain keeps its blocking thread
/// parked in `block_on`, and the inner chains need blocking threads of
/// their own. A runtime whose `max_blocking_threads` does not exceed the
/// nesting depth plus the widest inner layer deadlocks instead of failing.
pub struct NestedRegion {
    region: Arc<Region>,
    handle: Handle,
}

impl NestedRegion {
    pub fn new(region: Arc<Region>, handle: Handle) -> Self {
        Self { region, handle }
    }

    /// Wrap `region` using the runtime the caller is running in.
    pub fn current(region: Arc<Region>) -> Result<Self> {
        let handle = Handle::try_current().context("nested regions need a Tokio runtime")?;
        Ok(Self::new(region, handle))
    }

    pub fn region(&self) -> &Region {
        &self.region
    }
}

impl Element for NestedRegion {
    fn init(&self) -> Result<()> {
        if !self.region.is_initialized() {
            bail!(
                "nested region '{}' must be initialised before its parent",
                self.region.name()
            );
        }
        Ok(())
    }

    fn run(&self) -> Result<()> {
        debug!(region = %self.region.name(), "running nested region");
        self.handle
            .block_on(self.region.process(ExecMode::Run))
            .with_context(|| format!("nested region '{}' failed", self.region.name()))
    }
}
