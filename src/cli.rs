// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `tasksmith`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tasksmith",
    version,
    about = "Compile declarative provisioning configs into a resumable task list and run it.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory containing the root `build.yaml` of the config tree.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub config_root: String,

    /// Config server URL, recorded in the host facts for download
    /// collaborators.
    #[arg(long, value_name = "URL")]
    pub config_server: Option<String>,

    /// Where the compiled task list is persisted. Presence of this file at
    /// startup means provisioning is incomplete and the runner resumes it.
    #[arg(long, value_name = "PATH", default_value = "task_list.yaml")]
    pub task_list: String,

    /// Keep the task list file after successful completion instead of
    /// deleting it.
    #[arg(long)]
    pub preserve_tasks: bool,

    /// URL that must be reachable before any entry executes. Repeatable.
    #[arg(long = "check-url", value_name = "URL")]
    pub check_urls: Vec<String>,

    /// Validate the whole config tree offline: compile in memory and run
    /// every action's argument validation. No execution, no persistence.
    #[arg(long)]
    pub lint: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKSMITH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
