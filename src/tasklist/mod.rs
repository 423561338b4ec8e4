// src/tasklist/mod.rs

//! The persisted task list: the sole durable state of an in-progress build.
//!
//! The list is an ordered YAML sequence of entries; order is execution order.
//! The only permitted mutation is popping the head and rewriting the
//! remainder. Every rewrite goes through a temp-file-then-rename so a crash
//! mid-write can never leave a half-written list; absence of the file is the
//! signal that a fresh compilation is required.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use tracing::debug;

use crate::errors::{Result, TasksmithError};
use crate::fs::FileSystem;

/// One unit of checkpointing: a snapshot of the config path it was emitted
/// from plus the action payload(s) to dispatch. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListEntry {
    /// Active config path at emission time, for relative resource resolution
    /// and diagnostics.
    pub path: Vec<String>,

    /// `action_name -> args`, in document order.
    pub data: Mapping,
}

impl TaskListEntry {
    pub fn new(path: Vec<String>, action: &str, args: serde_yaml::Value) -> Self {
        let mut data = Mapping::new();
        data.insert(serde_yaml::Value::String(action.to_string()), args);
        Self { path, data }
    }
}

/// Load a task list, failing with a `Config` error if the file is missing or
/// malformed.
pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Vec<TaskListEntry>> {
    let contents = fs
        .read_to_string(path)
        .map_err(|e| TasksmithError::Config(format!("reading task list {path:?}: {e}")))?;

    serde_yaml::from_str(&contents)
        .map_err(|e| TasksmithError::Config(format!("parsing task list {path:?}: {e}")))
}

/// Atomically replace the task list at `path` with `entries`.
pub fn dump(fs: &dyn FileSystem, path: &Path, entries: &[TaskListEntry]) -> Result<()> {
    let serialized = serde_yaml::to_string(entries)?;
    let tmp = temp_path(path);

    fs.write(&tmp, serialized.as_bytes())?;
    fs.rename(&tmp, path)?;

    debug!(?path, entries = entries.len(), "task list persisted");
    Ok(())
}

/// Checkpoint after an entry was consumed: rewrite the remainder, or delete
/// the backing file once the list is empty.
pub fn checkpoint(fs: &dyn FileSystem, path: &Path, remaining: &[TaskListEntry]) -> Result<()> {
    if remaining.is_empty() {
        if fs.exists(path) {
            fs.remove_file(path)?;
        }
        debug!(?path, "task list drained; backing file removed");
        Ok(())
    } else {
        dump(fs, path, remaining)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "task_list.yaml".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}
