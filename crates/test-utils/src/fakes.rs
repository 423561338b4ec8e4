#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_yaml::Value;

use tasksmith::actions::{Action, ActionContext, ActionRegistry};
use tasksmith::errors::{Result, TasksmithError};
use tasksmith::facts::FactSource;
use tasksmith::runner::Reachability;
use tasksmith::signals::PowerAction;

/// One recorded power invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCall {
    pub restart: bool,
    pub timeout_secs: u64,
    pub reason: String,
}

/// Power collaborator that records instead of touching the OS.
#[derive(Debug, Clone, Default)]
pub struct RecordingPower {
    calls: Arc<Mutex<Vec<PowerCall>>>,
}

impl RecordingPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PowerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, restart: bool, timeout_secs: u64, reason: &str) {
        self.calls.lock().unwrap().push(PowerCall {
            restart,
            timeout_secs,
            reason: reason.to_string(),
        });
    }
}

impl PowerAction for RecordingPower {
    fn restart(&self, timeout_secs: u64, reason: &str) -> Result<()> {
        self.record(true, timeout_secs, reason);
        Ok(())
    }

    fn shutdown(&self, timeout_secs: u64, reason: &str) -> Result<()> {
        self.record(false, timeout_secs, reason);
        Ok(())
    }
}

/// Reachability fake: succeeds for every URL, or fails for URLs containing a
/// configured substring.
#[derive(Debug, Clone, Default)]
pub struct FakeReachability {
    fail_on: Option<String>,
}

impl FakeReachability {
    pub fn reachable() -> Self {
        Self::default()
    }

    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
        }
    }
}

impl Reachability for FakeReachability {
    fn check(&self, url: &str) -> Result<()> {
        match &self.fail_on {
            Some(pattern) if url.contains(pattern) => Err(TasksmithError::CheckUrl(format!(
                "{url}: unreachable (test fake)"
            ))),
            _ => Ok(()),
        }
    }
}

/// Deterministic fact source for tests.
#[derive(Debug, Clone)]
pub struct StubFactSource {
    pub model: String,
    pub os_code: String,
    pub serial: String,
    pub tpm: bool,
    pub device_ids: Vec<String>,
    pub nics: Vec<String>,
}

impl Default for StubFactSource {
    fn default() -> Self {
        Self {
            model: "HP Z640 Workstation".to_string(),
            os_code: "win10".to_string(),
            serial: "SN-0001".to_string(),
            tpm: true,
            device_ids: vec!["PCI\\VEN_8086&DEV_1533".to_string()],
            nics: vec!["eth0".to_string()],
        }
    }
}

impl StubFactSource {
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_os_code(mut self, os_code: &str) -> Self {
        self.os_code = os_code.to_string();
        self
    }

    pub fn with_tpm(mut self, tpm: bool) -> Self {
        self.tpm = tpm;
        self
    }
}

impl FactSource for StubFactSource {
    fn computer_model(&self) -> Result<String> {
        Ok(self.model.clone())
    }

    fn os_code(&self) -> Result<String> {
        Ok(self.os_code.clone())
    }

    fn serial_number(&self) -> Result<String> {
        Ok(self.serial.clone())
    }

    fn tpm_present(&self) -> Result<bool> {
        Ok(self.tpm)
    }

    fn device_ids(&self) -> Result<Vec<String>> {
        Ok(self.device_ids.clone())
    }

    fn network_interfaces(&self) -> Result<Vec<String>> {
        Ok(self.nics.clone())
    }
}

/// Register an action that records each dispatch (action name + first string
/// argument) into `log` and completes successfully.
pub fn register_probe(registry: &mut ActionRegistry, name: &str, log: Arc<Mutex<Vec<String>>>) {
    let action_name = name.to_string();
    registry.register(name, move |args| {
        Box::new(Probe {
            name: action_name.clone(),
            args,
            log: log.clone(),
            realtime: false,
        })
    });
}

/// Register a realtime action that records each dispatch during compilation.
pub fn register_realtime_probe(
    registry: &mut ActionRegistry,
    name: &str,
    log: Arc<Mutex<Vec<String>>>,
) {
    let action_name = name.to_string();
    registry.register(name, move |args| {
        Box::new(Probe {
            name: action_name.clone(),
            args,
            log: log.clone(),
            realtime: true,
        })
    });
}

/// Register an action whose `run` always fails with an `Action` error.
pub fn register_failing(registry: &mut ActionRegistry, name: &str) {
    let action_name = name.to_string();
    registry.register(name, move |_args| {
        Box::new(Failing {
            name: action_name.clone(),
        })
    });
}

struct Probe {
    name: String,
    args: Value,
    log: Arc<Mutex<Vec<String>>>,
    realtime: bool,
}

impl Action for Probe {
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn run(
        &mut self,
        _ctx: &mut ActionContext<'_>,
    ) -> Result<Option<tasksmith::signals::ControlSignal>> {
        let detail = self
            .args
            .as_sequence()
            .and_then(|s| s.first())
            .and_then(|v| v.as_str())
            .unwrap_or("");
        self.log.lock().unwrap().push(format!("{}:{detail}", self.name));
        Ok(None)
    }

    fn is_realtime(&self) -> bool {
        self.realtime
    }
}

struct Failing {
    name: String,
}

impl Action for Failing {
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn run(
        &mut self,
        _ctx: &mut ActionContext<'_>,
    ) -> Result<Option<tasksmith::signals::ControlSignal>> {
        Err(TasksmithError::Action(format!("{} failed (test fake)", self.name)))
    }
}
