// src/actions/mod.rs

//! Action dispatch framework.
//!
//! Actions are the leaves of a configuration document: named operations with
//! a positional argument list. The engine is agnostic to what they actually
//! do; it only relies on the three-method contract below. Concrete host
//! mutations are thin wrappers over OS binaries and live in [`builtin`]
//! (or in external collaborator crates).
//!
//! A handler marked realtime runs *during compilation* rather than being
//! deferred into the persisted task list; this is how config-source switches
//! and pre-boot transitions take effect while the tree is still being walked.

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::errors::{Result, TasksmithError};
use crate::facts::HostFacts;
use crate::signals::ControlSignal;

pub mod builtin;

/// Execution context handed to a running action.
pub struct ActionContext<'a> {
    /// Active config path of the entry being executed, for relative resource
    /// resolution and diagnostics.
    pub path: &'a [String],
    pub facts: &'a mut HostFacts,
}

/// Uniform handler contract.
pub trait Action {
    /// Argument-shape checking, callable without side effects. Used by
    /// offline linting; the build/run pipeline itself does not invoke it.
    fn validate(&self) -> Result<()>;

    /// Perform the side effect. May complete normally, fail fatally, or
    /// yield a [`ControlSignal`] interrupting sequential dispatch.
    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<Option<ControlSignal>>;

    /// Whether this handler's effect must happen during compilation instead
    /// of being queued.
    fn is_realtime(&self) -> bool {
        false
    }
}

/// Constructor producing a handler from its argument payload.
pub type ActionCtor = Box<dyn Fn(Value) -> Box<dyn Action>>;

/// Init-time registration table mapping action names to constructors.
///
/// Unknown action names are a fatal authoring mistake, raised by the builder
/// and never silently ignored.
#[derive(Default)]
pub struct ActionRegistry {
    table: BTreeMap<String, ActionCtor>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with all builtin handlers registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("set_timer", builtin::set_timer);
        registry.register("sleep", builtin::sleep);
        registry.register("execute", builtin::execute);
        registry.register("reboot", builtin::reboot);
        registry.register("shutdown", builtin::shutdown);
        registry.register("change_server", builtin::change_server);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn(Value) -> Box<dyn Action> + 'static,
    {
        self.table.insert(name.into(), Box::new(ctor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn build(&self, name: &str, args: Value) -> Result<Box<dyn Action>> {
        let ctor = self
            .table
            .get(name)
            .ok_or_else(|| TasksmithError::UnknownAction(name.to_string()))?;
        Ok(ctor(args))
    }
}
