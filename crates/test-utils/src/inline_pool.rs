use std::sync::{Arc, Mutex};

use regionflow::exec::{ChainUnit, UnitFuture, WorkerPool};

/// A fake worker pool that:
/// - records the member names of every submitted chain
/// - processes each unit immediately on the submitting thread.
#[derive(Debug, Clone, Default)]
pub struct InlinePool {
    submitted: Arc<Mutex<Vec<Vec<String>>>>,
}

impl InlinePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chains submitted so far, as member names.
    pub fn submissions(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn unit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

impl WorkerPool for InlinePool {
    fn submit(&self, unit: ChainUnit) -> UnitFuture {
        let names = unit
            .chain()
            .names(unit.registry())
            .into_iter()
            .map(str::to_string)
            .collect();
        self.submitted.lock().unwrap().push(names);

        let status = unit.process();
        Box::pin(std::future::ready(status))
    }
}
