// tests/tasklist_roundtrip.rs

use std::path::Path;

use proptest::prelude::*;
use serde_yaml::Value;

use tasksmith::fs::mock::MockFileSystem;
use tasksmith::fs::{FileSystem, RealFileSystem};
use tasksmith::tasklist::{self, TaskListEntry};

const LIST: &str = "task_list.yaml";

fn entry(path: &[&str], action: &str, args: &[&str]) -> TaskListEntry {
    TaskListEntry::new(
        path.iter().map(|s| s.to_string()).collect(),
        action,
        Value::Sequence(args.iter().map(|a| Value::String(a.to_string())).collect()),
    )
}

#[test]
fn checkpoint_rewrites_the_remainder() {
    let fs = MockFileSystem::new();
    let entries = vec![
        entry(&[], "set_timer", &["start__build.yaml"]),
        entry(&["drivers"], "execute", &["pnputil /add-driver nic.inf"]),
    ];
    tasklist::dump(&fs, Path::new(LIST), &entries).unwrap();

    tasklist::checkpoint(&fs, Path::new(LIST), &entries[1..]).unwrap();
    let remaining = tasklist::load(&fs, Path::new(LIST)).unwrap();
    assert_eq!(remaining, entries[1..]);
}

#[test]
fn checkpoint_removes_the_file_once_drained() {
    let fs = MockFileSystem::new();
    let entries = vec![entry(&[], "sleep", &["5"])];
    tasklist::dump(&fs, Path::new(LIST), &entries).unwrap();
    assert!(fs.exists(Path::new(LIST)));

    tasklist::checkpoint(&fs, Path::new(LIST), &[]).unwrap();
    assert!(!fs.exists(Path::new(LIST)));
    // Draining an already-absent list is not an error.
    tasklist::checkpoint(&fs, Path::new(LIST), &[]).unwrap();
}

#[test]
fn dump_leaves_no_temp_file_behind() {
    let fs = MockFileSystem::new();
    tasklist::dump(&fs, Path::new(LIST), &[entry(&[], "sleep", &["1"])]).unwrap();

    assert_eq!(fs.file_count(), 1);
    assert!(!fs.exists(Path::new("task_list.yaml.tmp")));
}

#[test]
fn malformed_list_is_rejected_on_load() {
    let fs = MockFileSystem::new();
    fs.add_file(LIST, "- this is: [not, a, task, entry\n");
    assert!(tasklist::load(&fs, Path::new(LIST)).is_err());
}

#[test]
fn real_filesystem_persistence_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let fs = RealFileSystem;
    let path = dir.path().join("task_list.yaml");
    let entries = vec![
        entry(&[], "set_timer", &["start__build.yaml"]),
        entry(&["apps"], "execute", &["installer.cmd"]),
    ];

    tasklist::dump(&fs, &path, &entries).unwrap();
    assert!(!dir.path().join("task_list.yaml.tmp").exists());
    assert_eq!(tasklist::load(&fs, &path).unwrap(), entries);

    tasklist::checkpoint(&fs, &path, &entries[1..]).unwrap();
    assert_eq!(tasklist::load(&fs, &path).unwrap(), entries[1..]);

    tasklist::checkpoint(&fs, &path, &[]).unwrap();
    assert!(!path.exists());
}

fn entry_strategy() -> impl Strategy<Value = TaskListEntry> {
    (
        prop::collection::vec("[a-z][a-z0-9_-]{0,7}", 0..3),
        "[a-z][a-z_]{0,11}",
        prop::collection::vec("[ -~]{0,16}", 0..4),
    )
        .prop_map(|(path, action, args)| {
            TaskListEntry::new(
                path,
                &action,
                Value::Sequence(args.into_iter().map(Value::String).collect()),
            )
        })
}

proptest! {
    /// Persisting and reloading a list preserves entries, their order and
    /// their path snapshots exactly.
    #[test]
    fn dump_then_load_is_identity(entries in prop::collection::vec(entry_strategy(), 0..8)) {
        let fs = MockFileSystem::new();
        tasklist::dump(&fs, Path::new(LIST), &entries).unwrap();

        let loaded = tasklist::load(&fs, Path::new(LIST)).unwrap();
        prop_assert_eq!(loaded, entries);
        // Atomic replace: exactly the final file, never a stray temp file.
        prop_assert_eq!(fs.file_count(), 1);
    }

    /// Popping heads one at a time and checkpointing always leaves exactly
    /// the unexecuted suffix on disk.
    #[test]
    fn checkpoints_persist_the_suffix(entries in prop::collection::vec(entry_strategy(), 1..6)) {
        let fs = MockFileSystem::new();
        tasklist::dump(&fs, Path::new(LIST), &entries).unwrap();

        let mut tasks = entries.clone();
        while !tasks.is_empty() {
            tasks.remove(0);
            tasklist::checkpoint(&fs, Path::new(LIST), &tasks).unwrap();
            if tasks.is_empty() {
                prop_assert!(!fs.exists(Path::new(LIST)));
            } else {
                let on_disk = tasklist::load(&fs, Path::new(LIST)).unwrap();
                prop_assert_eq!(&on_disk, &tasks);
            }
        }
    }
}
