// src/builder/mod.rs

//! Task-list compiler.
//!
//! Recursively walks the configuration tree from `build.yaml` at the root,
//! applies pin gating to each control block, expands templates and includes,
//! runs realtime actions immediately and queues everything else as task-list
//! entries. On success the flat ordered list is persisted; it then becomes
//! the sole durable state the runner consumes.
//!
//! Compilation state (`tasks` accumulator + active path stack) is threaded
//! explicitly through the recursion via [`CompilerState`] rather than living
//! on the builder, so each recursive call's effects stay local and testable.

use std::path::Path;

use serde_yaml::Value;
use tracing::{debug, info};

use crate::actions::{ActionContext, ActionRegistry};
use crate::config::model::{ControlBlock, INCLUDE_KEY, PIN_KEY, TEMPLATE_KEY};
use crate::config::reader::ConfigReader;
use crate::errors::{Result, TasksmithError};
use crate::facts::{ActiveConfigPath, HostFacts};
use crate::fs::FileSystem;
use crate::pins;
use crate::signals::{ControlSignal, SignalKind};
use crate::tasklist::{self, TaskListEntry};

/// Filename of the document loaded at every level of the include tree.
pub const ROOT_FILENAME: &str = "build.yaml";

/// Key the runner reserves for policy verification; queueable without being a
/// registered action.
pub const POLICY_KEY: &str = "policy";

const TIMER_ACTION: &str = "set_timer";

/// Whether the walk executes realtime actions and persists, or only checks
/// argument shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Execute,
    Lint,
}

/// Mutable compilation state threaded by reference through the recursive
/// walk.
#[derive(Debug, Default)]
pub struct CompilerState {
    pub tasks: Vec<TaskListEntry>,
    pub path: ActiveConfigPath,
}

pub struct Builder<'a> {
    fs: &'a dyn FileSystem,
    reader: &'a dyn ConfigReader,
    registry: &'a ActionRegistry,
    facts: &'a mut HostFacts,
    mode: BuildMode,
}

impl<'a> Builder<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        reader: &'a dyn ConfigReader,
        registry: &'a ActionRegistry,
        facts: &'a mut HostFacts,
    ) -> Self {
        Self {
            fs,
            reader,
            registry,
            facts,
            mode: BuildMode::Execute,
        }
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Compile the tree rooted at `root_path` and persist the resulting list
    /// to `out_path`.
    ///
    /// A server change raised by a realtime action restarts the walk from an
    /// empty root path; entries accumulated before the restart are kept. A
    /// restart/shutdown signal flushes the accumulated list and bubbles up so
    /// the caller can invoke the power collaborator; normal completion
    /// returns `None` after persisting.
    pub fn compile(
        &mut self,
        state: &mut CompilerState,
        out_path: &Path,
        root_path: &str,
    ) -> Result<Option<ControlSignal>> {
        let mut root = root_path.to_string();
        loop {
            match self.compile_document(state, &root, ROOT_FILENAME)? {
                None => break,
                Some(signal) if signal.kind == SignalKind::ServerChange => {
                    info!(
                        accumulated = state.tasks.len(),
                        "config server changed during compilation; restarting walk from empty \
                         root, keeping accumulated entries"
                    );
                    root.clear();
                    state.path.set(&[]);
                }
                Some(signal) => {
                    tasklist::dump(self.fs, out_path, &state.tasks)?;
                    return Ok(Some(signal));
                }
            }
        }

        tasklist::dump(self.fs, out_path, &state.tasks)?;
        info!(entries = state.tasks.len(), ?out_path, "task list compiled");
        Ok(None)
    }

    /// Walk the tree in lint mode: every pinned-in action is validated, no
    /// realtime action runs, nothing is persisted.
    pub fn lint(&mut self, state: &mut CompilerState, root_path: &str) -> Result<()> {
        self.compile_document(state, root_path, ROOT_FILENAME)?;
        info!(entries = state.tasks.len(), "lint complete");
        Ok(())
    }

    fn compile_document(
        &mut self,
        state: &mut CompilerState,
        path: &str,
        filename: &str,
    ) -> Result<Option<ControlSignal>> {
        let pushed = !path.is_empty();
        if pushed {
            state.path.append(path);
        }
        debug!(%path, %filename, position = %state.path, "compiling document");

        let document = self.reader.read(state.path.segments(), filename)?;

        // Bracketing timers: the stop timer is emitted even when the walk
        // fails partway, so build-duration metrics survive partial failures.
        self.queue_timer(state, format!("start_{path}_{filename}"));
        let walked = self.walk_controls(state, &document);
        self.queue_timer(state, format!("stop_{path}_{filename}"));

        if pushed {
            state.path.pop();
        }
        walked
    }

    fn walk_controls(
        &mut self,
        state: &mut CompilerState,
        document: &crate::config::ConfigDocument,
    ) -> Result<Option<ControlSignal>> {
        for block in &document.controls {
            if !self.pins_pass(block)? {
                debug!(position = %state.path, "pins did not match; skipping block");
                continue;
            }
            if let Some(signal) = self.store_controls(state, block, &document.templates)? {
                return Ok(Some(signal));
            }
        }
        Ok(None)
    }

    /// A block applies only when every declared pin passes.
    fn pins_pass(&self, block: &ControlBlock) -> Result<bool> {
        for (name, values) in block.pins()? {
            if !pins::evaluate(self.facts, &name, &values)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn store_controls(
        &mut self,
        state: &mut CompilerState,
        block: &ControlBlock,
        templates: &std::collections::BTreeMap<String, ControlBlock>,
    ) -> Result<Option<ControlSignal>> {
        for (key, value) in block.entries()? {
            match key {
                PIN_KEY => {}
                TEMPLATE_KEY => {
                    for name in block.template_names(value)? {
                        let body = templates.get(&name).ok_or_else(|| {
                            TasksmithError::Config(format!("template '{name}' is not defined"))
                        })?;
                        if let Some(signal) = self.store_controls(state, body, templates)? {
                            return Ok(Some(signal));
                        }
                    }
                }
                INCLUDE_KEY => {
                    for (sub_path, sub_file) in block.includes(value)? {
                        if let Some(signal) =
                            self.compile_document(state, &sub_path, &sub_file)?
                        {
                            return Ok(Some(signal));
                        }
                    }
                }
                POLICY_KEY => {
                    self.check_policy_args(value)?;
                    self.queue(state, POLICY_KEY, value.clone());
                }
                name if self.registry.contains(name) => {
                    if let Some(signal) = self.handle_action(state, name, value)? {
                        return Ok(Some(signal));
                    }
                }
                unknown => {
                    return Err(TasksmithError::UnknownAction(unknown.to_string()));
                }
            }
        }
        Ok(None)
    }

    fn handle_action(
        &mut self,
        state: &mut CompilerState,
        name: &str,
        args: &Value,
    ) -> Result<Option<ControlSignal>> {
        let mut action = self.registry.build(name, args.clone())?;

        if self.mode == BuildMode::Lint {
            action.validate()?;
            return Ok(None);
        }

        if action.is_realtime() {
            debug!(action = name, position = %state.path, "running realtime action");
            let path_snapshot = state.path.segments().to_vec();
            let mut ctx = ActionContext {
                path: &path_snapshot,
                facts: &mut *self.facts,
            };
            return action.run(&mut ctx);
        }

        self.queue(state, name, args.clone());
        Ok(None)
    }

    fn queue(&self, state: &mut CompilerState, name: &str, args: Value) {
        debug!(action = name, position = %state.path, "queueing task");
        state
            .tasks
            .push(TaskListEntry::new(state.path.segments().to_vec(), name, args));
    }

    fn queue_timer(&self, state: &mut CompilerState, label: String) {
        let args = Value::Sequence(vec![Value::String(label)]);
        self.queue(state, TIMER_ACTION, args);
    }

    fn check_policy_args(&self, value: &Value) -> Result<()> {
        let seq = value.as_sequence().ok_or_else(|| {
            TasksmithError::Config("`policy` must be a list of policy names".to_string())
        })?;
        for item in seq {
            if item.as_str().is_none() {
                return Err(TasksmithError::Config(format!(
                    "policy name is not a string: {item:?}"
                )));
            }
        }
        Ok(())
    }
}
