// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::Region;
use crate::exec::TokioWorkerPool;
use crate::types::ExecMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - region construction and analysis
/// - the Tokio runtime whose blocking pool executes chains
/// - repeated runs, then teardown
pub fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading region description '{}'", args.config))?;

    let mut region = Region::from_config(&cfg)?;

    if args.dry_run {
        region.init()?;
        print_dry_run(&cfg, &region);
        region.deinit()?;
        return Ok(());
    }

    let runs = args.runs.unwrap_or(cfg.config.runs);
    let runtime = build_runtime(&cfg)?;
    runtime.block_on(drive(region, runs, args.mode))
}

/// Build the runtime chains execute on.
///
/// `[config].worker_threads` caps the blocking pool, which is where
/// [`TokioWorkerPool`] runs chains. Embedding regions through
/// [`NestedRegion`](crate::engine::NestedRegion) holds one blocking thread
/// per nesting level on top of that, so the cap must leave room for them.
pub fn build_runtime(cfg: &ConfigFile) -> std::io::Result<Runtime> {
    let mut builder = Builder::new_multi_thread();
    builder.enable_all().thread_name("regionflow-worker");
    if let Some(threads) = cfg.config.worker_threads {
        builder.max_blocking_threads(threads);
    }
    builder.build()
}

/// Initialise `region`, run it `runs` times, then tear it down.
///
/// In [`ExecMode::Mock`] each attempt only calls the elements' `before_run`
/// and `after_run` hooks through the region boundary, so no node body
/// executes. The first failed run stops the loop; the region is
/// deinitialised either way and the run error wins over a teardown error.
pub async fn drive(mut region: Region, runs: usize, mode: ExecMode) -> Result<()> {
    region.set_worker_pool(Arc::new(TokioWorkerPool::current()));
    region.init()?;

    let mut outcome = Ok(());
    for attempt in 1..=runs {
        let result = match mode {
            ExecMode::Run => region.run().await.map(|summary| {
                info!(
                    region = %region.name(),
                    attempt,
                    layers = summary.layers,
                    units = summary.units,
                    nodes = summary.nodes,
                    "run succeeded"
                )
            }),
            ExecMode::Mock => region.process(ExecMode::Mock).await.map(|()| {
                info!(region = %region.name(), attempt, "mock pass succeeded")
            }),
        };
        if let Err(err) = result {
            error!(region = %region.name(), attempt, error = %err, "run failed");
            outcome = Err(err);
            break;
        }
    }

    let teardown = region.deinit();
    outcome?;
    teardown?;
    Ok(())
}

/// Print the analysed schedule: one line per layer, chains joined by `->`.
fn print_dry_run(cfg: &ConfigFile, region: &Region) {
    println!("regionflow dry-run");
    println!("  config.name = {}", cfg.config.name);
    match cfg.config.worker_threads {
        Some(threads) => println!("  config.worker_threads = {threads}"),
        None => println!("  config.worker_threads = (runtime default)"),
    }
    println!("  config.runs = {}", cfg.config.runs);
    println!();

    println!("nodes ({}):", cfg.node.len());
    for (name, node) in cfg.node.iter() {
        println!("  - {name}");
        println!("      cmd: {}", node.cmd);
        if !node.after.is_empty() {
            println!("      after: {:?}", node.after);
        }
        if !node.runnable {
            println!("      runnable: false");
        }
        if node.linkable {
            println!("      linkable: true");
        }
    }
    println!();

    let Some(registry) = region.registry() else {
        return;
    };
    let schedule = region.schedule();
    println!(
        "schedule ({} layers, {} chains):",
        schedule.len(),
        schedule.chain_count()
    );
    for (index, layer) in schedule.describe(registry).iter().enumerate() {
        let chains: Vec<String> = layer.iter().map(|chain| chain.join(" -> ")).collect();
        println!("  layer {index}: [{}]", chains.join("], ["));
    }
}
