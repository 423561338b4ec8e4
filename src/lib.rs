// src/lib.rs

pub mod actions;
pub mod builder;
pub mod cli;
pub mod config;
pub mod errors;
pub mod facts;
pub mod fs;
pub mod logging;
pub mod pins;
pub mod policy;
pub mod runner;
pub mod signals;
pub mod tasklist;

use std::path::PathBuf;

use tracing::info;

use crate::actions::ActionRegistry;
use crate::builder::{BuildMode, Builder, CompilerState};
use crate::cli::CliArgs;
use crate::config::FileConfigReader;
use crate::errors::Result;
use crate::facts::{EnvFactSource, HostFacts};
use crate::fs::{FileSystem, RealFileSystem};
use crate::policy::PolicyRegistry;
use crate::runner::{HttpReachability, RunOutcome, Runner};
use crate::signals::{PowerAction, SignalKind, SystemPower};

/// High-level entry point used by `main.rs`.
///
/// Decides between the two phases:
/// - no task list on disk: compile the config tree, persist the list, run it;
/// - task list present: provisioning is incomplete from a previous boot, so
///   skip the builder and resume the runner against the existing list.
///
/// Returns normally both on completion and after a power signal (the power
/// collaborator was already invoked and the machine is about to go down);
/// every error is fatal and surfaces to `main` for a nonzero exit.
pub fn run(args: CliArgs) -> Result<()> {
    let fs = RealFileSystem;
    let source = EnvFactSource;
    let mut facts = HostFacts::gather(&source)?;
    if let Some(server) = &args.config_server {
        facts.set_config_server(server.clone());
    }

    let registry = ActionRegistry::builtin();
    let policies = PolicyRegistry::builtin();
    let reader = FileConfigReader::new(&args.config_root, &fs);
    let task_list_path = PathBuf::from(&args.task_list);

    if args.lint {
        let mut state = CompilerState::default();
        Builder::new(&fs, &reader, &registry, &mut facts)
            .with_mode(BuildMode::Lint)
            .lint(&mut state, "")?;
        println!("ok: {} entries", state.tasks.len());
        return Ok(());
    }

    if fs.exists(&task_list_path) {
        info!(?task_list_path, "existing task list found; resuming execution");
    } else {
        info!(config_root = %args.config_root, "no task list found; compiling config tree");
        let mut state = CompilerState::default();
        let mut builder = Builder::new(&fs, &reader, &registry, &mut facts);
        if let Some(signal) = builder.compile(&mut state, &task_list_path, "")? {
            // A realtime action requested a power transition mid-compile; the
            // accumulated list is already flushed for the next boot.
            let power = SystemPower;
            invoke_power(&power, &signal)?;
            return Ok(());
        }
    }

    let power = SystemPower;
    let reachability = HttpReachability::new();
    let mut runner = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .with_preflight(&reachability, args.check_urls.clone())
        .with_preserve_tasks(args.preserve_tasks);

    match runner.run(&task_list_path)? {
        RunOutcome::Completed => {
            info!("provisioning complete");
        }
        RunOutcome::PowerInvoked(signal) => {
            info!(kind = ?signal.kind, reason = %signal.reason, "power action invoked; exiting");
        }
    }
    Ok(())
}

fn invoke_power(power: &dyn PowerAction, signal: &crate::signals::ControlSignal) -> Result<()> {
    match signal.kind {
        SignalKind::Restart => power.restart(signal.timeout_secs, &signal.reason),
        SignalKind::Shutdown => power.shutdown(signal.timeout_secs, &signal.reason),
        SignalKind::ServerChange => Ok(()),
    }
}
