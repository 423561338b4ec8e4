// src/pins/mod.rs

//! Pin evaluation: pure predicate logic deciding whether a control block
//! applies to this host.
//!
//! A pin is `(name, accepted_values)` where each value is either a literal to
//! match or a literal prefixed with `!` denoting exclusion. Comparison is
//! case-insensitive; `computer_model` and `device_id` pins compare loosely
//! (accepted value is a prefix of the fact value), all other pins compare
//! exactly.
//!
//! Mixing `!`-excluded and plain values in one pin is discouraged: the
//! presence of any exclusion switches the whole pin into exclusion-only mode
//! and the plain values are ignored.

use serde_yaml::Value;

use crate::errors::{Result, TasksmithError};
use crate::facts::HostFacts;

/// Pins whose name starts with this prefix read from the dynamic
/// user-response map instead of hardware/OS facts.
pub const USER_PIN_PREFIX: &str = "user_";

const EXCLUDE_PREFIX: char = '!';

/// Core match predicate.
///
/// 1. Either list empty: no match.
/// 2. Any `!`-prefixed accept value that matches a fact value wins
///    immediately: no match.
/// 3. If any exclusion was present and none fired: match (exclusion-only
///    mode; plain values are ignored).
/// 4. No exclusions at all: match iff any accept value equals (or, loosely,
///    prefixes) any fact value.
pub fn match_values(fact_values: &[String], accept_values: &[String], loose: bool) -> bool {
    if fact_values.is_empty() || accept_values.is_empty() {
        return false;
    }

    let facts: Vec<String> = fact_values.iter().map(|v| v.to_lowercase()).collect();

    let mut saw_exclusion = false;
    for accept in accept_values {
        let Some(stripped) = accept.strip_prefix(EXCLUDE_PREFIX) else {
            continue;
        };
        saw_exclusion = true;
        let excluded = stripped.to_lowercase();
        if facts.iter().any(|f| value_matches(f, &excluded, loose)) {
            return false;
        }
    }

    if saw_exclusion {
        // Exclusion-only mode: nothing was excluded, so the pin passes.
        return true;
    }

    accept_values.iter().any(|accept| {
        let accept = accept.to_lowercase();
        facts.iter().any(|f| value_matches(f, &accept, loose))
    })
}

fn value_matches(fact: &str, accept: &str, loose: bool) -> bool {
    if loose {
        fact.starts_with(accept)
    } else {
        fact == accept
    }
}

/// Evaluate one named pin against the host.
///
/// Dispatches the pin name to the fact it gates on; referencing a name with
/// no backing fact is a fatal `SysInfo` error.
pub fn evaluate(facts: &HostFacts, pin_name: &str, accept_values: &[Value]) -> Result<bool> {
    let accept = normalize_values(pin_name, accept_values)?;

    if pin_name.starts_with(USER_PIN_PREFIX) {
        // User-response pins: no exclusion support; an absent response means
        // the block does not apply.
        let Some(response) = facts.user_response(pin_name) else {
            return Ok(false);
        };
        return Ok(accept.iter().any(|a| a.eq_ignore_ascii_case(response)));
    }

    let (fact_values, loose): (Vec<String>, bool) = match pin_name {
        "computer_model" => (vec![facts.computer_model.clone()], true),
        "device_id" => (facts.device_ids.clone(), true),
        "os_code" => (vec![facts.os_code.clone()], false),
        "serial_number" => (vec![facts.serial_number.clone()], false),
        "tpm_present" => (vec![facts.tpm_present.to_string()], false),
        "network_interface" => (facts.network_interfaces.clone(), false),
        other => {
            return Err(TasksmithError::SysInfo(format!(
                "pin '{other}' does not correspond to any known host fact"
            )));
        }
    };

    Ok(match_values(&fact_values, &accept, loose))
}

/// Pin values may be YAML strings, booleans or numbers; everything is
/// compared as lowercase text.
fn normalize_values(pin_name: &str, values: &[Value]) -> Result<Vec<String>> {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(TasksmithError::Config(format!(
                "pin '{pin_name}' has a non-scalar value: {other:?}"
            ))),
        })
        .collect()
}
