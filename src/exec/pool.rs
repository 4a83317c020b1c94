// src/exec/pool.rs

//! Pluggable worker pool abstraction.
//!
//! A region never owns threads. It hands each chain to a `WorkerPool` as a
//! [`ChainUnit`] and gets back a future that resolves once the chain has
//! finished on some worker.
//!
//! - `TokioWorkerPool` is the production implementation; every unit runs on
//!   Tokio's blocking thread pool.
//! - Tests can provide their own `WorkerPool` that, for example, records
//!   submissions and processes units inline.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::dag::{Chain, Registry};
use crate::errors::RegionError;
use crate::types::{ExecMode, RunToken};

/// Eventual status of a submitted unit: the number of nodes it completed.
pub type UnitFuture = Pin<Box<dyn Future<Output = Result<usize, RegionError>> + Send + 'static>>;

/// One chain, packaged with everything needed to run it on another thread.
pub struct ChainUnit {
    registry: Arc<Registry>,
    chain: Chain,
    token: RunToken,
    mode: ExecMode,
}

impl ChainUnit {
    pub fn new(registry: Arc<Registry>, chain: Chain, token: RunToken, mode: ExecMode) -> Self {
        Self {
            registry,
            chain,
            token,
            mode,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the chain synchronously on the calling thread.
    pub fn process(self) -> Result<usize, RegionError> {
        self.chain.process(&self.registry, self.token, self.mode)
    }
}

impl fmt::Debug for ChainUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainUnit")
            .field("chain", &self.chain)
            .field("token", &self.token)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting where chains are executed.
pub trait WorkerPool: Send + Sync {
    /// Start executing `unit` and return a handle to its eventual status.
    ///
    /// Implementations must keep running the unit even if the returned
    /// future is never polled to completion.
    fn submit(&self, unit: ChainUnit) -> UnitFuture;
}

/// Worker pool backed by Tokio's blocking threads.
///
/// Chains run synchronously, so they go to `spawn_blocking` rather than onto
/// the async worker threads. The number of threads is governed by the
/// runtime's `max_blocking_threads`.
#[derive(Debug, Clone)]
pub struct TokioWorkerPool {
    handle: Handle,
}

impl TokioWorkerPool {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Pool on the runtime the caller is running in.
    ///
    /// Panics when called outside a Tokio runtime, like `Handle::current`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl WorkerPool for TokioWorkerPool {
    fn submit(&self, unit: ChainUnit) -> UnitFuture {
        let head = unit.chain().head();
        debug!(%head, nodes = unit.chain().len(), "submitting chain to blocking pool");
        let join = self.handle.spawn_blocking(move || unit.process());

        Box::pin(async move {
            match join.await {
                Ok(status) => status,
                Err(err) => {
                    error!(%head, error = %err, "worker thread failed while running chain");
                    Err(RegionError::Pool(format!("chain {head}: {err}")))
                }
            }
        })
    }
}
