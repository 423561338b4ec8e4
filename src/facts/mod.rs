// src/facts/mod.rs

//! Host facts consumed by pin evaluation and actions.
//!
//! Facts are gathered once per run from a [`FactSource`] collaborator into an
//! explicit [`HostFacts`] value that is passed by reference into the builder,
//! runner and pin evaluator. There is no ambient global cache; callers that
//! need fresh facts call [`HostFacts::refresh`] explicitly.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::SystemTime;

use tracing::debug;

use crate::errors::Result;

pub mod path;

pub use path::ActiveConfigPath;

/// Collaborator that discovers facts about the host being provisioned.
///
/// Real hardware/OS introspection lives behind this trait; the engine only
/// cares that each getter either yields a value or fails with a `SysInfo`
/// error.
pub trait FactSource: Debug {
    fn computer_model(&self) -> Result<String>;
    fn os_code(&self) -> Result<String>;
    fn serial_number(&self) -> Result<String>;
    fn tpm_present(&self) -> Result<bool>;
    fn device_ids(&self) -> Result<Vec<String>>;
    fn network_interfaces(&self) -> Result<Vec<String>>;
}

/// Memoized host facts for one provisioning run.
#[derive(Debug, Clone, Default)]
pub struct HostFacts {
    pub computer_model: String,
    pub os_code: String,
    pub serial_number: String,
    pub tpm_present: bool,
    pub device_ids: Vec<String>,
    pub network_interfaces: Vec<String>,

    /// Responses captured by the interactive chooser (an external
    /// collaborator); keyed by the full `user_*` pin name.
    user_responses: BTreeMap<String, String>,

    /// Build timers recorded by the `set_timer` action.
    timers: BTreeMap<String, SystemTime>,

    /// Config source, rewritten by the realtime `change_server` action.
    config_server: Option<String>,
}

impl HostFacts {
    /// Gather all facts from the source. Any getter failure is fatal.
    pub fn gather(source: &dyn FactSource) -> Result<Self> {
        let facts = Self {
            computer_model: source.computer_model()?,
            os_code: source.os_code()?,
            serial_number: source.serial_number()?,
            tpm_present: source.tpm_present()?,
            device_ids: source.device_ids()?,
            network_interfaces: source.network_interfaces()?,
            user_responses: BTreeMap::new(),
            timers: BTreeMap::new(),
            config_server: None,
        };
        debug!(
            model = %facts.computer_model,
            os_code = %facts.os_code,
            serial = %facts.serial_number,
            tpm = facts.tpm_present,
            "host facts gathered"
        );
        Ok(facts)
    }

    /// Re-gather hardware/OS facts, keeping user responses, timers and the
    /// config server.
    pub fn refresh(&mut self, source: &dyn FactSource) -> Result<()> {
        self.computer_model = source.computer_model()?;
        self.os_code = source.os_code()?;
        self.serial_number = source.serial_number()?;
        self.tpm_present = source.tpm_present()?;
        self.device_ids = source.device_ids()?;
        self.network_interfaces = source.network_interfaces()?;
        Ok(())
    }

    pub fn user_response(&self, pin_name: &str) -> Option<&str> {
        self.user_responses.get(pin_name).map(|s| s.as_str())
    }

    pub fn set_user_response(&mut self, pin_name: impl Into<String>, value: impl Into<String>) {
        self.user_responses.insert(pin_name.into(), value.into());
    }

    pub fn set_timer(&mut self, name: impl Into<String>) {
        self.timers.insert(name.into(), SystemTime::now());
    }

    pub fn timer(&self, name: &str) -> Option<SystemTime> {
        self.timers.get(name).copied()
    }

    pub fn config_server(&self) -> Option<&str> {
        self.config_server.as_deref()
    }

    pub fn set_config_server(&mut self, server: impl Into<String>) {
        self.config_server = Some(server.into());
    }
}

/// Thin production fact source.
///
/// Reads `TASKSMITH_*` environment variables seeded by the imaging
/// environment's inventory tooling; real hardware introspection is an
/// external collaborator and deliberately not reimplemented here.
#[derive(Debug, Clone, Default)]
pub struct EnvFactSource;

impl EnvFactSource {
    fn var(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn list_var(name: &str) -> Vec<String> {
        Self::var(name)
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }
}

impl FactSource for EnvFactSource {
    fn computer_model(&self) -> Result<String> {
        Ok(Self::var("TASKSMITH_MODEL").unwrap_or_else(|| "unknown".to_string()))
    }

    fn os_code(&self) -> Result<String> {
        Ok(Self::var("TASKSMITH_OS_CODE").unwrap_or_else(|| "unknown".to_string()))
    }

    fn serial_number(&self) -> Result<String> {
        Ok(Self::var("TASKSMITH_SERIAL").unwrap_or_else(|| "unknown".to_string()))
    }

    fn tpm_present(&self) -> Result<bool> {
        Ok(matches!(
            Self::var("TASKSMITH_TPM").as_deref(),
            Some("1") | Some("true") | Some("TRUE") | Some("True")
        ))
    }

    fn device_ids(&self) -> Result<Vec<String>> {
        Ok(Self::list_var("TASKSMITH_DEVICE_IDS"))
    }

    fn network_interfaces(&self) -> Result<Vec<String>> {
        Ok(Self::list_var("TASKSMITH_NICS"))
    }
}
