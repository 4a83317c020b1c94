// tests/nested_region.rs

use std::error::Error;
use std::sync::Arc;

use regionflow::dag::NodeSpec;
use regionflow::engine::{NestedRegion, Region};
use regionflow::errors::{Hook, RegionError};
use regionflow::exec::TokioWorkerPool;
use regionflow_test_utils::builders::{ConfigFileBuilder, NodeConfigBuilder, RegionBuilder};
use regionflow_test_utils::elements::{ExecutionLog, RecordingElement};
use regionflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// inner: X -> Y (linkable), run on the Tokio blocking pool.
fn inner_region(log: &ExecutionLog) -> Result<Arc<Region>, RegionError> {
    let y = RecordingElement::new("Y", log.clone());
    let mut region = RegionBuilder::new("inner")
        .element("X", Arc::new(RecordingElement::new("X", log.clone())))
        .with_spec(NodeSpec::new("Y", Arc::new(y)).linkable(true))
        .edge("X", "Y")
        .build();
    region.set_worker_pool(Arc::new(TokioWorkerPool::current()));
    region.init()?;
    Ok(Arc::new(region))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nested_region_runs_as_a_single_outer_node() -> TestResult {
    init_tracing();

    let builder = RegionBuilder::new("outer");
    let log = builder.log();
    let inner = inner_region(&log)?;

    let mut outer = builder
        .node("pre")
        .element("inner", Arc::new(NestedRegion::current(inner.clone())?))
        .node("post")
        .path(&["pre", "inner", "post"])
        .build();
    outer.set_worker_pool(Arc::new(TokioWorkerPool::current()));
    outer.init()?;

    let summary = with_timeout(outer.run()).await?;

    assert_eq!(summary.layers, 3);
    assert_eq!(summary.nodes, 3);
    assert_eq!(log.entries(), vec!["pre", "X", "Y", "post"]);
    assert!(inner.is_done());
    assert!(inner.boundary_done());

    // The outer region holds the only other handle to `inner`.
    outer.deinit()?;
    drop(outer);
    let mut inner = Arc::try_unwrap(inner).map_err(|_| "inner region still shared")?;
    inner.deinit()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nested_region_runs_on_every_outer_run() -> TestResult {
    init_tracing();

    let builder = RegionBuilder::new("outer-twice");
    let log = builder.log();
    let inner = inner_region(&log)?;

    let mut outer = builder
        .element("inner", Arc::new(NestedRegion::current(inner)?))
        .build();
    outer.set_worker_pool(Arc::new(TokioWorkerPool::current()));
    outer.init()?;

    with_timeout(outer.run()).await?;
    with_timeout(outer.run()).await?;

    assert_eq!(log.count("X"), 2);
    assert_eq!(log.count("Y"), 2);
    Ok(())
}

#[test]
fn nested_region_fits_a_blocking_pool_of_depth_plus_width() -> TestResult {
    init_tracing();

    // One blocking thread parks in the outer chain, one runs the inner chain.
    let cfg = ConfigFileBuilder::new()
        .with_node("unused", NodeConfigBuilder::new("true").build())
        .with_worker_threads(2)
        .build();
    let runtime = regionflow::build_runtime(&cfg)?;

    runtime.block_on(async {
        let builder = RegionBuilder::new("outer-bounded");
        let log = builder.log();
        let inner = inner_region(&log)?;

        let mut outer = builder
            .node("pre")
            .element("inner", Arc::new(NestedRegion::current(inner)?))
            .path(&["pre", "inner"])
            .build();
        outer.set_worker_pool(Arc::new(TokioWorkerPool::current()));
        outer.init()?;

        with_timeout(outer.run()).await?;
        with_timeout(outer.run()).await?;

        assert_eq!(log.entries(), vec!["pre", "X", "Y", "pre", "X", "Y"]);
        Ok::<(), Box<dyn Error>>(())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inner_failure_fails_the_outer_node() -> TestResult {
    init_tracing();

    let mut inner = RegionBuilder::new("inner-failing").failing("boom").build();
    inner.set_worker_pool(Arc::new(TokioWorkerPool::current()));
    inner.init()?;

    let (mut outer, log) = RegionBuilder::new("outer-failing")
        .element("inner", Arc::new(NestedRegion::current(Arc::new(inner))?))
        .node("after")
        .edge("inner", "after")
        .build_with_log();
    outer.set_worker_pool(Arc::new(TokioWorkerPool::current()));
    outer.init()?;

    let err = with_timeout(outer.run()).await.unwrap_err();

    match &err {
        RegionError::Execution { failure, .. } => {
            assert_eq!(failure.node, "inner");
            assert_eq!(failure.hook, Hook::Run);
            assert!(format!("{:#}", failure.source).contains("boom exploded"));
        }
        other => panic!("expected execution error, got {other:?}"),
    }
    assert_eq!(log.count("after"), 0);
    Ok(())
}

#[tokio::test]
async fn uninitialised_inner_region_fails_outer_init() -> TestResult {
    init_tracing();

    let inner = RegionBuilder::new("cold-inner").node("A").build();
    let mut outer = RegionBuilder::new("outer-cold")
        .element("inner", Arc::new(NestedRegion::current(Arc::new(inner))?))
        .build();

    match outer.init() {
        Err(RegionError::Lifecycle(failure)) => {
            assert_eq!(failure.node, "inner");
            assert_eq!(failure.hook, Hook::Init);
        }
        other => panic!("expected lifecycle error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn nested_region_needs_a_runtime() {
    let inner = Arc::new(Region::new("orphan"));
    assert!(NestedRegion::current(inner).is_err());
}
