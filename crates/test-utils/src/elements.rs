use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use regionflow::dag::Element;

/// Shared, ordered record of which node bodies ran.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str) {
        self.entries.lock().unwrap().push(name.to_string());
    }

    /// Snapshot of everything recorded so far, in order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == name)
            .count()
    }

    /// Position of the first run of `name`, if it ran.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == name)
    }
}

/// Per-hook call counters, shared between a test and its elements.
#[derive(Debug, Default)]
pub struct HookCounts {
    pub init: AtomicUsize,
    pub before_run: AtomicUsize,
    pub run: AtomicUsize,
    pub after_run: AtomicUsize,
    pub deinit: AtomicUsize,
}

impl HookCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Element that records its name into an [`ExecutionLog`] when run.
pub struct RecordingElement {
    name: String,
    log: ExecutionLog,
    hooks: Arc<HookCounts>,
}

impl RecordingElement {
    pub fn new(name: &str, log: ExecutionLog) -> Self {
        Self::with_hooks(name, log, Arc::new(HookCounts::default()))
    }

    pub fn with_hooks(name: &str, log: ExecutionLog, hooks: Arc<HookCounts>) -> Self {
        Self {
            name: name.to_string(),
            log,
            hooks,
        }
    }
}

impl Element for RecordingElement {
    fn init(&self) -> Result<()> {
        self.hooks.init.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn before_run(&self) -> Result<()> {
        self.hooks.before_run.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn run(&self) -> Result<()> {
        self.hooks.run.fetch_add(1, Ordering::SeqCst);
        self.log.record(&self.name);
        Ok(())
    }

    fn after_run(&self) -> Result<()> {
        self.hooks.after_run.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn deinit(&self) -> Result<()> {
        self.hooks.deinit.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Element whose body always fails (after recording that it was attempted).
pub struct FailingElement {
    name: String,
    log: ExecutionLog,
}

impl FailingElement {
    pub fn new(name: &str, log: ExecutionLog) -> Self {
        Self {
            name: name.to_string(),
            log,
        }
    }
}

impl Element for FailingElement {
    fn run(&self) -> Result<()> {
        self.log.record(&self.name);
        bail!("{} exploded", self.name)
    }
}

/// Element whose `init` hook fails.
pub struct BrokenInitElement;

impl Element for BrokenInitElement {
    fn init(&self) -> Result<()> {
        bail!("cannot initialise")
    }

    fn run(&self) -> Result<()> {
        Ok(())
    }
}
