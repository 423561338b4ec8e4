// src/runner/mod.rs

//! Resumable executor.
//!
//! Reads the persisted task list, dispatches each entry through the action
//! registry, and checkpoints progress after each entry by atomically
//! rewriting the remainder. Designed to be re-entered across process
//! lifetimes: a restart/shutdown signal persists remaining work, invokes the
//! power collaborator and returns [`RunOutcome::PowerInvoked`], after which
//! the caller exits 0; the next boot finds the still-present list and resumes
//! from exactly where this run stopped.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::actions::{ActionContext, ActionRegistry};
use crate::builder::POLICY_KEY;
use crate::errors::{Result, TasksmithError};
use crate::facts::HostFacts;
use crate::fs::FileSystem;
use crate::policy::PolicyRegistry;
use crate::signals::{ControlSignal, PowerAction, SignalKind};
use crate::tasklist::{self, TaskListEntry};

/// How a run ended. In both cases the process should exit 0; the distinction
/// exists so callers (and tests) can observe that a power transition was
/// requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every entry executed; the backing file is gone (unless preservation
    /// was requested).
    Completed,
    /// A control signal interrupted execution; remaining work is persisted
    /// and the power collaborator has been invoked.
    PowerInvoked(ControlSignal),
}

/// Collaborator for preflight reachability checks.
pub trait Reachability: Debug {
    fn check(&self, url: &str) -> Result<()>;
}

/// Production reachability check: a blocking HTTP GET that only cares about
/// getting *any* well-formed response.
#[derive(Debug)]
pub struct HttpReachability {
    client: reqwest::blocking::Client,
}

impl HttpReachability {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpReachability {
    fn default() -> Self {
        Self::new()
    }
}

impl Reachability for HttpReachability {
    fn check(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TasksmithError::CheckUrl(format!("{url}: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TasksmithError::CheckUrl(format!(
                "{url}: HTTP {}",
                response.status()
            )))
        }
    }
}

pub struct Runner<'a> {
    fs: &'a dyn FileSystem,
    registry: &'a ActionRegistry,
    policies: &'a PolicyRegistry,
    facts: &'a mut HostFacts,
    power: &'a dyn PowerAction,
    reachability: Option<&'a dyn Reachability>,
    check_urls: Vec<String>,
    preserve_tasks: bool,
}

impl<'a> Runner<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        registry: &'a ActionRegistry,
        policies: &'a PolicyRegistry,
        facts: &'a mut HostFacts,
        power: &'a dyn PowerAction,
    ) -> Self {
        Self {
            fs,
            registry,
            policies,
            facts,
            power,
            reachability: None,
            check_urls: Vec::new(),
            preserve_tasks: false,
        }
    }

    /// Enable preflight checks against the given URLs.
    pub fn with_preflight(
        mut self,
        reachability: &'a dyn Reachability,
        urls: Vec<String>,
    ) -> Self {
        self.reachability = Some(reachability);
        self.check_urls = urls;
        self
    }

    /// Keep the backing file after successful completion.
    pub fn with_preserve_tasks(mut self, preserve: bool) -> Self {
        self.preserve_tasks = preserve;
        self
    }

    /// Execute the persisted task list to completion or to the first control
    /// signal. Nothing is popped until an entry fully succeeds, so a crash or
    /// error leaves the list exactly as it was at the start of that entry.
    pub fn run(&mut self, task_list_path: &Path) -> Result<RunOutcome> {
        let mut path = task_list_path.to_path_buf();
        let mut tasks = tasklist::load(self.fs, &path)?;

        self.preflight()?;

        info!(entries = tasks.len(), ?path, "executing task list");

        while !tasks.is_empty() {
            let entry = tasks[0].clone();

            match self.run_entry(&entry) {
                Err(
                    err @ (TasksmithError::Policy(_)
                    | TasksmithError::UnknownPolicy(_)
                    | TasksmithError::UnknownAction(_)),
                ) => return Err(err),
                Err(err) => {
                    // Diagnostics point at the originating config path; the
                    // on-disk list is untouched since the last checkpoint.
                    return Err(TasksmithError::Config(format!(
                        "executing task from config path /{}: {err}",
                        entry.path.join("/")
                    )));
                }
                Ok(Some(signal)) => {
                    return self.handle_signal(signal, &mut tasks, &mut path);
                }
                Ok(None) => {
                    tasks.remove(0);
                    tasklist::checkpoint(self.fs, &path, &tasks)?;
                }
            }
        }

        if self.preserve_tasks {
            info!(?path, "task list complete; backing file preserved on request");
        } else if self.fs.exists(&path) {
            self.fs.remove_file(&path)?;
            info!(?path, "task list complete; backing file removed");
        }
        Ok(RunOutcome::Completed)
    }

    fn preflight(&self) -> Result<()> {
        let Some(reachability) = self.reachability else {
            return Ok(());
        };
        for url in &self.check_urls {
            debug!(url, "preflight reachability check");
            reachability.check(url)?;
        }
        Ok(())
    }

    /// Dispatch every (action, args) pair of one entry, in document order. A
    /// control signal short-circuits the rest of the entry.
    fn run_entry(&mut self, entry: &TaskListEntry) -> Result<Option<ControlSignal>> {
        for (key, args) in &entry.data {
            let name = key.as_str().ok_or_else(|| {
                TasksmithError::Config(format!("task entry key is not a string: {key:?}"))
            })?;

            if name == POLICY_KEY {
                self.verify_policies(args)?;
                continue;
            }

            debug!(action = name, path = ?entry.path, "dispatching action");
            let mut action = self.registry.build(name, args.clone())?;
            let mut ctx = ActionContext {
                path: &entry.path,
                facts: &mut *self.facts,
            };
            if let Some(signal) = action.run(&mut ctx)? {
                return Ok(Some(signal));
            }
        }
        Ok(None)
    }

    fn verify_policies(&self, args: &serde_yaml::Value) -> Result<()> {
        let seq = args.as_sequence().ok_or_else(|| {
            TasksmithError::Config("`policy` must be a list of policy names".to_string())
        })?;
        for item in seq {
            let name = item.as_str().ok_or_else(|| {
                TasksmithError::Config(format!("policy name is not a string: {item:?}"))
            })?;
            debug!(policy = name, "verifying policy");
            self.policies.verify(name, self.facts)?;
        }
        Ok(())
    }

    /// Checkpoint according to the signal's options, invoke the power
    /// collaborator, and surface the outcome. The caller terminates the
    /// process with exit code 0; control never re-enters the execution loop.
    fn handle_signal(
        &mut self,
        signal: ControlSignal,
        tasks: &mut Vec<TaskListEntry>,
        path: &mut PathBuf,
    ) -> Result<RunOutcome> {
        if signal.kind == SignalKind::ServerChange {
            return Err(TasksmithError::Config(
                "server change signalled outside compilation".to_string(),
            ));
        }

        info!(
            kind = ?signal.kind,
            reason = %signal.reason,
            timeout_secs = signal.timeout_secs,
            retry_on_restart = signal.retry_on_restart,
            pop_next = signal.pop_next,
            "control signal received; suspending execution"
        );

        let previous_path = path.clone();
        if let Some(override_path) = &signal.task_list_path {
            path.clone_from(override_path);
        }

        if !signal.retry_on_restart && !tasks.is_empty() {
            tasks.remove(0);
        }
        if signal.pop_next && !tasks.is_empty() {
            tasks.remove(0);
        }

        tasklist::checkpoint(self.fs, path, tasks)?;
        if *path != previous_path && self.fs.exists(&previous_path) {
            // The old location usually disappears at reboot anyway; a stale
            // copy is harmless because the next boot reads the new location.
            if let Err(e) = self.fs.remove_file(&previous_path) {
                warn!(?previous_path, error = %e, "could not remove superseded task list");
            }
        }

        match signal.kind {
            SignalKind::Restart => self.power.restart(signal.timeout_secs, &signal.reason)?,
            SignalKind::Shutdown => self.power.shutdown(signal.timeout_secs, &signal.reason)?,
            SignalKind::ServerChange => unreachable!("rejected above"),
        }

        Ok(RunOutcome::PowerInvoked(signal))
    }
}
