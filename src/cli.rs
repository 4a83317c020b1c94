// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::ExecMode;

/// Command-line arguments for `regionflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "regionflow",
    version,
    about = "Analyse a region of dependent commands into parallel layers and run it.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the region description (TOML).
    ///
    /// Default: `Regionflow.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Regionflow.toml")]
    pub config: String,

    /// Override `[config].runs`: how many times the region is run.
    #[arg(long, value_name = "N")]
    pub runs: Option<usize>,

    /// `run` executes node commands; `mock` only walks the region boundary
    /// and lifecycle hooks without executing anything.
    #[arg(long, value_name = "MODE", default_value = "run")]
    pub mode: ExecMode,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REGIONFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse, validate and analyse; print the schedule but run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
