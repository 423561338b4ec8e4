// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Every variant here is fatal at the point it surfaces: the engine does not
//! retry, does not skip to the next entry, and does not attempt partial
//! recovery. Errors propagate to the process boundary, where they are logged
//! and the process exits nonzero. The on-disk task list is left exactly as it
//! was at the last successful checkpoint, so the next invocation resumes
//! without losing completed work.
//!
//! Restart/shutdown/server-change are *not* errors; they are modelled as
//! [`crate::signals::ControlSignal`] values so that "please reboot" can never
//! be mistaken for "something failed".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TasksmithError {
    /// Compile-time, parse, or read failure in a configuration document or
    /// the persisted task list.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An action's `run()` failed while mutating the host.
    #[error("Action error: {0}")]
    Action(String),

    /// An action's `validate()` rejected its argument shape. Only surfaced
    /// through offline linting, never during the build/run pipeline.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration document named an action that is not registered.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A `policy` entry named a policy that is not registered.
    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    /// Pin evaluation referenced a host fact that could not be determined.
    #[error("System info error: {0}")]
    SysInfo(String),

    /// A preflight reachability check failed before any host mutation.
    #[error("URL check failed: {0}")]
    CheckUrl(String),

    /// A named policy rejected the host or its current state.
    #[error("Policy error: {0}")]
    Policy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TasksmithError>;
