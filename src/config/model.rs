// src/config/model.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::errors::{Result, TasksmithError};

/// Keys with structural meaning inside a control block. Everything else must
/// be a registered action name.
pub const PIN_KEY: &str = "pin";
pub const INCLUDE_KEY: &str = "include";
pub const TEMPLATE_KEY: &str = "template";

/// One parsed configuration document.
///
/// ```yaml
/// templates:
///   drivers:
///     - execute: ["inject-drivers.cmd"]
/// controls:
///   - pin:
///       os_code: [win10]
///     include:
///       - [workstation, build.yaml]
///   - template: [drivers]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    /// Ordered control blocks; document order is compile order.
    pub controls: Vec<ControlBlock>,

    /// Named reusable block bodies referenced via `template: [name, ...]`.
    #[serde(default)]
    pub templates: BTreeMap<String, ControlBlock>,
}

/// One conditionally-applicable unit of a document: an ordered mapping whose
/// keys are either structural directives (`pin`, `include`, `template`) or
/// registered action names with their argument payloads. Multiple action keys
/// may coexist in one block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlBlock(pub Mapping);

impl ControlBlock {
    /// Look up a key by name. YAML mappings preserve insertion order, so this
    /// scans rather than relying on hashing of `Value` keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// All key/value pairs in document order. A non-string key is an
    /// authoring mistake and surfaces as a `Config` error.
    pub fn entries(&self) -> Result<Vec<(&str, &Value)>> {
        let mut out = Vec::with_capacity(self.0.len());
        for (k, v) in &self.0 {
            let key = k.as_str().ok_or_else(|| {
                TasksmithError::Config(format!("control block key is not a string: {k:?}"))
            })?;
            out.push((key, v));
        }
        Ok(out)
    }

    /// The `pin` directive, as (pin name, accepted values) pairs in document
    /// order. Returns an empty list when the block declares no pins.
    pub fn pins(&self) -> Result<Vec<(String, Vec<Value>)>> {
        let Some(value) = self.get(PIN_KEY) else {
            return Ok(Vec::new());
        };
        let mapping = value.as_mapping().ok_or_else(|| {
            TasksmithError::Config("`pin` must be a mapping of pin name to value list".to_string())
        })?;

        let mut pins = Vec::with_capacity(mapping.len());
        for (k, v) in mapping {
            let name = k.as_str().ok_or_else(|| {
                TasksmithError::Config(format!("pin name is not a string: {k:?}"))
            })?;
            let values = v
                .as_sequence()
                .ok_or_else(|| {
                    TasksmithError::Config(format!(
                        "pin '{name}' values must be a list, got: {v:?}"
                    ))
                })?
                .clone();
            pins.push((name.to_string(), values));
        }
        Ok(pins)
    }

    /// The `include` directive, as (sub-path, filename) pairs.
    pub fn includes(&self, value: &Value) -> Result<Vec<(String, String)>> {
        let seq = value.as_sequence().ok_or_else(|| {
            TasksmithError::Config("`include` must be a list of [path, filename] pairs".to_string())
        })?;

        let mut includes = Vec::with_capacity(seq.len());
        for item in seq {
            let pair = item.as_sequence().filter(|p| p.len() == 2).ok_or_else(|| {
                TasksmithError::Config(format!(
                    "each `include` entry must be a [path, filename] pair, got: {item:?}"
                ))
            })?;
            let path = pair[0].as_str().ok_or_else(|| {
                TasksmithError::Config(format!("include path is not a string: {:?}", pair[0]))
            })?;
            let filename = pair[1].as_str().ok_or_else(|| {
                TasksmithError::Config(format!("include filename is not a string: {:?}", pair[1]))
            })?;
            includes.push((path.to_string(), filename.to_string()));
        }
        Ok(includes)
    }

    /// The `template` directive, as a list of template names.
    pub fn template_names(&self, value: &Value) -> Result<Vec<String>> {
        let seq = value.as_sequence().ok_or_else(|| {
            TasksmithError::Config("`template` must be a list of template names".to_string())
        })?;

        let mut names = Vec::with_capacity(seq.len());
        for item in seq {
            let name = item.as_str().ok_or_else(|| {
                TasksmithError::Config(format!("template name is not a string: {item:?}"))
            })?;
            names.push(name.to_string());
        }
        Ok(names)
    }
}
