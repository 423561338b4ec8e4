// src/signals.rs

//! Control signals and the power-action collaborator.
//!
//! A [`ControlSignal`] is a structured, non-error outcome of running an
//! action: "restart the machine", "shut it down", or "the config server
//! changed, recompile from the new root". Signals interrupt normal sequential
//! dispatch but are deliberately disjoint from [`crate::errors::TasksmithError`].

use std::path::PathBuf;

/// Which power transition (or compile restart) the signal requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Reboot the host; provisioning resumes from the persisted list on the
    /// next boot.
    Restart,
    /// Power the host off; provisioning resumes when it is next powered on.
    Shutdown,
    /// Raised by a realtime action during compilation: the config source
    /// changed, restart the walk from an empty root path.
    ServerChange,
}

/// Structured interruption of sequential dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSignal {
    pub kind: SignalKind,

    /// OS-level delay, in seconds, before the power action takes effect.
    pub timeout_secs: u64,

    /// Human-readable reason, passed through to the power collaborator and
    /// the logs.
    pub reason: String,

    /// Keep the current task-list entry in place so it re-executes after the
    /// reboot. The action opting into this must be idempotent.
    pub retry_on_restart: bool,

    /// Also discard the entry immediately following the current one.
    pub pop_next: bool,

    /// Where the runner should persist (and the next boot should read) the
    /// remaining task list, when the list's location changes across the
    /// power transition.
    pub task_list_path: Option<PathBuf>,
}

impl ControlSignal {
    pub fn restart(timeout_secs: u64, reason: impl Into<String>) -> Self {
        Self::new(SignalKind::Restart, timeout_secs, reason)
    }

    pub fn shutdown(timeout_secs: u64, reason: impl Into<String>) -> Self {
        Self::new(SignalKind::Shutdown, timeout_secs, reason)
    }

    pub fn server_change() -> Self {
        Self::new(SignalKind::ServerChange, 0, "config server changed")
    }

    fn new(kind: SignalKind, timeout_secs: u64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            timeout_secs,
            reason: reason.into(),
            retry_on_restart: false,
            pop_next: false,
            task_list_path: None,
        }
    }

    pub fn with_retry_on_restart(mut self, retry: bool) -> Self {
        self.retry_on_restart = retry;
        self
    }

    pub fn with_pop_next(mut self, pop_next: bool) -> Self {
        self.pop_next = pop_next;
        self
    }

    pub fn with_task_list_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.task_list_path = Some(path.into());
        self
    }
}

/// Collaborator that performs the actual OS power transition.
///
/// Fire-and-forget: after either call returns, the caller terminates the
/// process with exit code 0 and control never re-enters the engine. Tests use
/// a recording fake instead of touching the OS.
pub trait PowerAction {
    fn restart(&self, timeout_secs: u64, reason: &str) -> crate::errors::Result<()>;
    fn shutdown(&self, timeout_secs: u64, reason: &str) -> crate::errors::Result<()>;
}

/// Production power collaborator: shells out to the platform's shutdown
/// binary.
#[derive(Debug, Clone, Default)]
pub struct SystemPower;

impl PowerAction for SystemPower {
    fn restart(&self, timeout_secs: u64, reason: &str) -> crate::errors::Result<()> {
        invoke_shutdown_binary(true, timeout_secs, reason)
    }

    fn shutdown(&self, timeout_secs: u64, reason: &str) -> crate::errors::Result<()> {
        invoke_shutdown_binary(false, timeout_secs, reason)
    }
}

fn invoke_shutdown_binary(restart: bool, timeout_secs: u64, reason: &str) -> crate::errors::Result<()> {
    use std::process::Command;

    tracing::info!(restart, timeout_secs, reason, "invoking OS power action");

    let status = if cfg!(windows) {
        let mode = if restart { "/r" } else { "/s" };
        Command::new("shutdown")
            .args([mode, "/t", &timeout_secs.to_string(), "/c", reason])
            .status()?
    } else {
        let mode = if restart { "-r" } else { "-h" };
        // `shutdown -r +m` takes minutes; round sub-minute delays up to "now".
        let when = if timeout_secs >= 60 {
            format!("+{}", timeout_secs / 60)
        } else {
            "now".to_string()
        };
        Command::new("shutdown").args([mode, &when, reason]).status()?
    };

    if !status.success() {
        return Err(crate::errors::TasksmithError::Action(format!(
            "shutdown binary exited with {status}"
        )));
    }
    Ok(())
}
