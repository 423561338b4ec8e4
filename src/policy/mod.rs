// src/policy/mod.rs

//! Imaging policies: named checks a host must pass before execution of an
//! entry proceeds.
//!
//! A `policy: [name, ...]` entry in the task list makes the runner call each
//! named policy's `verify` against the host facts; any rejection is a fatal
//! `Policy` error and an unknown name is a fatal `UnknownPolicy` error.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::errors::{Result, TasksmithError};
use crate::facts::HostFacts;

pub trait Policy: Debug {
    fn verify(&self, facts: &HostFacts) -> Result<()>;
}

/// Init-time table of named policies.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    table: BTreeMap<String, Box<dyn Policy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("tpm_present", Box::new(TpmPresent));
        registry.register("physical_machine", Box::new(PhysicalMachine));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, policy: Box<dyn Policy>) {
        self.table.insert(name.into(), policy);
    }

    pub fn verify(&self, name: &str, facts: &HostFacts) -> Result<()> {
        let policy = self
            .table
            .get(name)
            .ok_or_else(|| TasksmithError::UnknownPolicy(name.to_string()))?;
        policy.verify(facts)
    }
}

/// Rejects hosts without a TPM (e.g. before queueing disk encryption).
#[derive(Debug)]
pub struct TpmPresent;

impl Policy for TpmPresent {
    fn verify(&self, facts: &HostFacts) -> Result<()> {
        if facts.tpm_present {
            Ok(())
        } else {
            Err(TasksmithError::Policy(
                "host has no TPM; refusing to continue".to_string(),
            ))
        }
    }
}

/// Rejects virtual machines.
#[derive(Debug)]
pub struct PhysicalMachine;

impl Policy for PhysicalMachine {
    fn verify(&self, facts: &HostFacts) -> Result<()> {
        let model = facts.computer_model.to_lowercase();
        let virtual_markers = ["vmware", "virtualbox", "virtual machine", "qemu", "kvm"];
        if virtual_markers.iter().any(|m| model.contains(m)) {
            Err(TasksmithError::Policy(format!(
                "'{}' is a virtual machine; imaging is restricted to physical hosts",
                facts.computer_model
            )))
        } else {
            Ok(())
        }
    }
}
