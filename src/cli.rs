// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `gridtask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gridtask",
    version,
    about = "Run a single-target task against a node of a configured topology.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the topology config file (TOML).
    ///
    /// Default: `Grid.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Grid.toml")]
    pub config: String,

    /// ID of the node to query. Defaults to the first configured node.
    #[arg(long, value_name = "ID")]
    pub node: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GRIDTASK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the topology, but don't dispatch anything.
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

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
