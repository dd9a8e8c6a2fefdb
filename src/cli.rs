// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::GraphFormat;

/// Command-line arguments for `stackdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stackdag",
    version,
    about = "Order and run commands across a tree of stacks.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Unit paths are resolved against the directory holding this file.
    #[arg(long, value_name = "PATH", default_value = "Stackdag.toml")]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STACKDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the selected units in run order.
    List {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Print the order reversed.
        #[arg(long)]
        reverse: bool,

        /// Print a JSON array instead of one path per line.
        #[arg(long)]
        json: bool,
    },

    /// Print the ordering graph of the selected units.
    Graph {
        #[command(flatten)]
        selection: SelectionArgs,

        #[arg(long, value_name = "FORMAT", default_value = "dot")]
        format: GraphFormat,
    },

    /// Run a command in every selected unit.
    Run {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        exec: ExecArgs,

        /// Program and arguments, after `--`.
        #[arg(last = true, required = true, value_name = "CMD")]
        cmd: Vec<String>,
    },

    /// Run a named script's jobs in every selected unit.
    Script {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        exec: ExecArgs,

        /// Name of a `[script.<name>]` section.
        name: String,
    },
}

/// Which units take part.
#[derive(Debug, Clone, Default, Args)]
pub struct SelectionArgs {
    /// Only units carrying at least one of these tags.
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Skip units carrying any of these tags.
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    pub no_tags: Vec<String>,

    /// Only units listed in this file (one path per line).
    #[arg(long, value_name = "FILE")]
    pub changed_file: Option<PathBuf>,

    /// Only units at or below this project directory.
    #[arg(long, value_name = "DIR")]
    pub scope: Option<String>,
}

/// How selected units are executed. Flags override `[config]`.
#[derive(Debug, Clone, Default, Args)]
pub struct ExecArgs {
    /// Maximum number of units running at once.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub parallel: Option<u32>,

    /// Keep running dependents of failed units.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Walk the order reversed.
    #[arg(long)]
    pub reverse: bool,

    /// Emit lifecycle events without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Append lifecycle events to this file as JSON lines.
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,
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
