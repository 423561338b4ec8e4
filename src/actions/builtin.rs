// src/actions/builtin.rs

//! Builtin action handlers.
//!
//! These are deliberately thin wrappers: the interesting host mutations
//! (partitioning, registry edits, driver injection, ...) belong to external
//! collaborator handlers registered alongside these. What lives here is the
//! minimum the engine itself needs: build timers, waiting, command execution
//! and the power/server control actions.

use serde_yaml::Value;
use tracing::info;

use crate::actions::{Action, ActionContext};
use crate::errors::{Result, TasksmithError};
use crate::signals::ControlSignal;

pub fn set_timer(args: Value) -> Box<dyn Action> {
    Box::new(SetTimer { args })
}

pub fn sleep(args: Value) -> Box<dyn Action> {
    Box::new(Sleep { args })
}

pub fn execute(args: Value) -> Box<dyn Action> {
    Box::new(Execute { args })
}

pub fn reboot(args: Value) -> Box<dyn Action> {
    Box::new(PowerSignal { args, restart: true })
}

pub fn shutdown(args: Value) -> Box<dyn Action> {
    Box::new(PowerSignal { args, restart: false })
}

pub fn change_server(args: Value) -> Box<dyn Action> {
    Box::new(ChangeServer { args })
}

/// `set_timer: [name]`: record a named build timer in the host facts.
struct SetTimer {
    args: Value,
}

impl SetTimer {
    fn name(&self) -> Result<&str> {
        single_string(&self.args, "set_timer")
    }
}

impl Action for SetTimer {
    fn validate(&self) -> Result<()> {
        self.name().map(|_| ())
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<Option<ControlSignal>> {
        let name = self.name()?;
        info!(timer = name, "build timer");
        ctx.facts.set_timer(name);
        Ok(None)
    }
}

/// `sleep: [seconds]`: pause execution.
struct Sleep {
    args: Value,
}

impl Sleep {
    fn seconds(&self) -> Result<u64> {
        let seq = args_seq(&self.args, "sleep")?;
        if seq.len() != 1 {
            return Err(validation("sleep", "expected exactly one argument (seconds)"));
        }
        seq[0]
            .as_u64()
            .ok_or_else(|| validation("sleep", "seconds must be a non-negative integer"))
    }
}

impl Action for Sleep {
    fn validate(&self) -> Result<()> {
        self.seconds().map(|_| ())
    }

    fn run(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Option<ControlSignal>> {
        let seconds = self.seconds()?;
        info!(seconds, "sleeping");
        std::thread::sleep(std::time::Duration::from_secs(seconds));
        Ok(None)
    }
}

/// `execute: [command, ...]`: run each command through the platform shell;
/// a nonzero exit is a fatal action error.
struct Execute {
    args: Value,
}

impl Execute {
    fn commands(&self) -> Result<Vec<&str>> {
        let seq = args_seq(&self.args, "execute")?;
        if seq.is_empty() {
            return Err(validation("execute", "expected at least one command"));
        }
        seq.iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| validation("execute", "each command must be a string"))
            })
            .collect()
    }
}

impl Action for Execute {
    fn validate(&self) -> Result<()> {
        self.commands().map(|_| ())
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<Option<ControlSignal>> {
        use std::process::Command;

        for command in self.commands()? {
            info!(command, path = ?ctx.path, "executing command");

            let status = if cfg!(windows) {
                Command::new("cmd").args(["/C", command]).status()
            } else {
                Command::new("sh").args(["-c", command]).status()
            }
            .map_err(|e| TasksmithError::Action(format!("spawning '{command}': {e}")))?;

            if !status.success() {
                return Err(TasksmithError::Action(format!(
                    "'{command}' exited with {status}"
                )));
            }
        }
        Ok(None)
    }
}

/// `reboot: [timeout_secs, reason, retry_on_restart?, pop_next?]` and
/// `shutdown: [...]`: emit the corresponding control signal. The power
/// transition itself is performed by the runner's power collaborator.
struct PowerSignal {
    args: Value,
    restart: bool,
}

impl PowerSignal {
    fn signal(&self) -> Result<ControlSignal> {
        let name = if self.restart { "reboot" } else { "shutdown" };
        let seq = args_seq(&self.args, name)?;
        if seq.len() < 2 || seq.len() > 4 {
            return Err(validation(
                name,
                "expected [timeout_secs, reason, retry_on_restart?, pop_next?]",
            ));
        }

        let timeout_secs = seq[0]
            .as_u64()
            .ok_or_else(|| validation(name, "timeout_secs must be a non-negative integer"))?;
        let reason = seq[1]
            .as_str()
            .ok_or_else(|| validation(name, "reason must be a string"))?;
        let retry_on_restart = opt_bool(seq, 2, name)?;
        let pop_next = opt_bool(seq, 3, name)?;

        let signal = if self.restart {
            ControlSignal::restart(timeout_secs, reason)
        } else {
            ControlSignal::shutdown(timeout_secs, reason)
        };
        Ok(signal
            .with_retry_on_restart(retry_on_restart)
            .with_pop_next(pop_next))
    }
}

impl Action for PowerSignal {
    fn validate(&self) -> Result<()> {
        self.signal().map(|_| ())
    }

    fn run(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Option<ControlSignal>> {
        Ok(Some(self.signal()?))
    }
}

/// `change_server: [server_url]`: realtime: rewrite the config source and
/// restart compilation from the new root.
struct ChangeServer {
    args: Value,
}

impl ChangeServer {
    fn server(&self) -> Result<&str> {
        single_string(&self.args, "change_server")
    }
}

impl Action for ChangeServer {
    fn validate(&self) -> Result<()> {
        self.server().map(|_| ())
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<Option<ControlSignal>> {
        let server = self.server()?;
        info!(server, "config server changed; compilation will restart from the new root");
        ctx.facts.set_config_server(server);
        Ok(Some(ControlSignal::server_change()))
    }

    fn is_realtime(&self) -> bool {
        true
    }
}

fn args_seq<'a>(args: &'a Value, action: &str) -> Result<&'a Vec<Value>> {
    args.as_sequence()
        .ok_or_else(|| validation(action, "arguments must be a list"))
}

fn single_string<'a>(args: &'a Value, action: &str) -> Result<&'a str> {
    let seq = args_seq(args, action)?;
    if seq.len() != 1 {
        return Err(validation(action, "expected exactly one argument"));
    }
    seq[0]
        .as_str()
        .ok_or_else(|| validation(action, "argument must be a string"))
}

fn opt_bool(seq: &[Value], index: usize, action: &str) -> Result<bool> {
    match seq.get(index) {
        None => Ok(false),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| validation(action, "optional flags must be booleans")),
    }
}

fn validation(action: &str, message: &str) -> TasksmithError {
    TasksmithError::Validation(format!("{action}: {message}"))
}
