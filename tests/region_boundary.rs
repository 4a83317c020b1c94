// tests/region_boundary.rs

use std::error::Error;
use std::io;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::bail;
use regionflow::dag::{DependencyState, Element};
use regionflow::errors::{Hook, RegionError};
use regionflow::types::ExecMode;
use regionflow_test_utils::builders::RegionBuilder;
use regionflow_test_utils::elements::{ExecutionLog, HookCounts, RecordingElement};
use regionflow_test_utils::init_tracing;
use regionflow_test_utils::inline_pool::InlinePool;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn dependency_state_counts_down_and_saturates() {
    let state = DependencyState::new(2);
    assert!(!state.is_ready());

    assert_eq!(state.satisfy_one(), 1);
    assert_eq!(state.satisfy_one(), 0);
    assert!(state.is_ready());
    // An extra decrement is logged and leaves the count at zero.
    assert_eq!(state.satisfy_one(), 0);

    state.mark_done();
    state.set_dependency_count(3);
    state.reset();
    assert_eq!(state.remaining(), 3);
    assert!(!state.is_done());
}

/// Log sink that keeps everything written to it.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn satisfying_past_zero_logs_a_warning() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let state = DependencyState::new(1);
        assert_eq!(state.satisfy_one(), 0);
        assert_eq!(state.satisfy_one(), 0);
    });

    let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert_eq!(output.matches("satisfied more often").count(), 1, "{output}");
    assert!(output.contains("WARN"));
}

#[test]
fn dependency_count_is_settable_through_shared_reference() {
    let region = RegionBuilder::new("outer-node").node("A").build();
    assert_eq!(region.dependency_count(), 0);

    region.set_dependency_count(2);

    assert_eq!(region.dependency_count(), 2);
    assert_eq!(region.dependency_state().dependency_count(), 2);
}

#[test]
fn after_run_releases_every_dependent() -> TestResult {
    init_tracing();

    let first = Arc::new(DependencyState::new(1));
    let second = Arc::new(DependencyState::new(2));

    let mut region = RegionBuilder::new("producer").node("A").build();
    region.add_dependent(first.clone())?;
    region.add_dependent(second.clone())?;
    region.init()?;

    region.before_run()?;
    assert!(!region.boundary_done());

    region.after_run()?;

    assert!(region.boundary_done());
    assert_eq!(first.remaining(), 0);
    assert!(first.is_ready());
    assert_eq!(second.remaining(), 1);
    Ok(())
}

#[tokio::test]
async fn before_run_clears_done_flags_and_resets_boundary() -> TestResult {
    init_tracing();

    let mut region = RegionBuilder::new("boundary")
        .node("A")
        .node("B")
        .build()
        .with_worker_pool(Arc::new(InlinePool::new()));
    region.set_dependency_count(1);
    region.init()?;

    region.run().await?;
    assert!(region.is_done());
    region.after_run()?;
    assert!(region.boundary_done());

    region.before_run()?;

    assert!(!region.is_done());
    assert!(!region.boundary_done());
    assert_eq!(region.remaining_dependencies(), 1);
    Ok(())
}

#[tokio::test]
async fn process_runs_the_whole_boundary_lifecycle() -> TestResult {
    init_tracing();

    let downstream = Arc::new(DependencyState::new(1));
    let (mut region, log) = RegionBuilder::new("process")
        .node("A")
        .linkable("B")
        .edge("A", "B")
        .build_with_log();
    region.set_worker_pool(Arc::new(InlinePool::new()));
    region.add_dependent(downstream.clone())?;
    region.init()?;

    region.process(ExecMode::Run).await?;

    assert_eq!(log.entries(), vec!["A", "B"]);
    assert!(region.is_done());
    assert!(region.boundary_done());
    assert!(downstream.is_ready());
    Ok(())
}

#[tokio::test]
async fn mock_process_skips_the_run() -> TestResult {
    init_tracing();

    let downstream = Arc::new(DependencyState::new(1));
    let hooks = Arc::new(HookCounts::default());
    let log = ExecutionLog::new();
    // No worker pool: mock mode never submits anything.
    let mut region = RegionBuilder::new("mock")
        .element(
            "A",
            Arc::new(RecordingElement::with_hooks("A", log.clone(), hooks.clone())),
        )
        .build();
    region.add_dependent(downstream.clone())?;
    region.init()?;
    let before = HookCounts::get(&hooks.before_run);
    let after = HookCounts::get(&hooks.after_run);

    region.process(ExecMode::Mock).await?;

    assert_eq!(HookCounts::get(&hooks.before_run), before + 1);
    assert_eq!(HookCounts::get(&hooks.after_run), after + 1);
    assert_eq!(HookCounts::get(&hooks.run), 0);
    assert!(log.entries().is_empty());
    assert!(!region.is_done());
    assert!(region.boundary_done());
    assert!(downstream.is_ready());
    Ok(())
}

/// Element whose `after_run` hook fails once `armed` is set.
struct TrippedAfterRun {
    armed: Arc<AtomicBool>,
}

impl Element for TrippedAfterRun {
    fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_run(&self) -> anyhow::Result<()> {
        if self.armed.load(Ordering::SeqCst) {
            bail!("after_run tripped");
        }
        Ok(())
    }
}

#[tokio::test]
async fn failing_boundary_hook_keeps_dependents_waiting() -> TestResult {
    init_tracing();

    let armed = Arc::new(AtomicBool::new(false));
    let downstream = Arc::new(DependencyState::new(1));
    let mut region = RegionBuilder::new("tripped")
        .element(
            "A",
            Arc::new(TrippedAfterRun {
                armed: armed.clone(),
            }),
        )
        .build();
    region.add_dependent(downstream.clone())?;
    region.init()?;
    armed.store(true, Ordering::SeqCst);

    let err = region.process(ExecMode::Mock).await.unwrap_err();

    match err {
        RegionError::Lifecycle(failure) => {
            assert_eq!(failure.node, "A");
            assert_eq!(failure.hook, Hook::AfterRun);
        }
        other => panic!("expected lifecycle error, got {other:?}"),
    }
    assert!(!region.boundary_done());
    assert_eq!(downstream.remaining(), 1);
    Ok(())
}

#[tokio::test]
async fn process_without_pool_changes_nothing() -> TestResult {
    init_tracing();

    let downstream = Arc::new(DependencyState::new(1));
    let mut region = RegionBuilder::new("no-pool").node("A").build();
    region.add_dependent(downstream.clone())?;
    region.init()?;

    let err = region.process(ExecMode::Run).await.unwrap_err();

    assert!(matches!(err, RegionError::MissingWorkerPool { .. }));
    assert!(!region.boundary_done());
    assert_eq!(downstream.remaining(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_run_does_not_release_dependents() -> TestResult {
    init_tracing();

    let downstream = Arc::new(DependencyState::new(1));
    let mut region = RegionBuilder::new("failing").failing("A").build();
    region.set_worker_pool(Arc::new(InlinePool::new()));
    region.add_dependent(downstream.clone())?;
    region.init()?;

    let err = region.process(ExecMode::Run).await.unwrap_err();

    assert!(matches!(err, RegionError::Execution { .. }));
    assert!(!region.boundary_done());
    assert_eq!(downstream.remaining(), 1);
    Ok(())
}

#[test]
fn boundary_hooks_require_initialisation() {
    init_tracing();

    let region = RegionBuilder::new("cold").node("A").build();

    assert!(matches!(
        region.before_run(),
        Err(RegionError::NotInitialized { .. })
    ));
    assert!(matches!(
        region.after_run(),
        Err(RegionError::NotInitialized { .. })
    ));
}

#[test]
fn dependents_are_fixed_at_init() {
    init_tracing();

    let mut region = RegionBuilder::new("sealed").node("A").build();
    region.init().unwrap();

    let late = Arc::new(DependencyState::new(1));
    assert!(matches!(
        region.add_dependent(late),
        Err(RegionError::AlreadyInitialized { .. })
    ));
}
