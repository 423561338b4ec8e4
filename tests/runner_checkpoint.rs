// tests/runner_checkpoint.rs

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_yaml::Value;

use tasksmith::actions::{Action, ActionContext, ActionRegistry};
use tasksmith::errors::{Result, TasksmithError};
use tasksmith::facts::HostFacts;
use tasksmith::fs::mock::MockFileSystem;
use tasksmith::fs::FileSystem;
use tasksmith::policy::PolicyRegistry;
use tasksmith::runner::{RunOutcome, Runner};
use tasksmith::signals::{ControlSignal, SignalKind};
use tasksmith::tasklist::{self, TaskListEntry};

use tasksmith_test_utils::builders::str_seq;
use tasksmith_test_utils::fakes::{
    register_failing, register_probe, FakeReachability, PowerCall, RecordingPower, StubFactSource,
};
use tasksmith_test_utils::init_tracing;

const LIST: &str = "task_list.yaml";

fn facts() -> HostFacts {
    HostFacts::gather(&StubFactSource::default()).unwrap()
}

fn probe_entry(arg: &str) -> TaskListEntry {
    TaskListEntry::new(Vec::new(), "probe", str_seq(&[arg]))
}

fn policy_entry(names: &[&str]) -> TaskListEntry {
    TaskListEntry::new(Vec::new(), "policy", str_seq(names))
}

fn reboot_entry(timeout_secs: u64, reason: &str, flags: &[bool]) -> TaskListEntry {
    let mut args = vec![
        Value::Number(timeout_secs.into()),
        Value::String(reason.to_string()),
    ];
    args.extend(flags.iter().map(|f| Value::Bool(*f)));
    TaskListEntry::new(Vec::new(), "reboot", Value::Sequence(args))
}

fn shutdown_entry(timeout_secs: u64, reason: &str) -> TaskListEntry {
    TaskListEntry::new(
        Vec::new(),
        "shutdown",
        Value::Sequence(vec![
            Value::Number(timeout_secs.into()),
            Value::String(reason.to_string()),
        ]),
    )
}

fn persist(fs: &MockFileSystem, entries: &[TaskListEntry]) {
    tasklist::dump(fs, Path::new(LIST), entries).unwrap();
}

#[test]
fn completes_list_and_removes_backing_file() {
    init_tracing();
    let fs = MockFileSystem::new();
    persist(&fs, &[probe_entry("one"), probe_entry("two")]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::builtin();
    register_probe(&mut registry, "probe", log.clone());
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let outcome = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .run(Path::new(LIST))
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(*log.lock().unwrap(), vec!["probe:one", "probe:two"]);
    assert!(!fs.exists(Path::new(LIST)));
    assert!(power.calls().is_empty());
}

#[test]
fn failed_entry_stays_at_the_head_of_the_persisted_list() {
    // An entry is popped only after it fully succeeds, so the failed entry is
    // the head of the on-disk list and re-executes on the next invocation.
    init_tracing();
    let fs = MockFileSystem::new();
    let failing = TaskListEntry::new(Vec::new(), "fail", str_seq(&[]));
    persist(&fs, &[probe_entry("one"), failing.clone(), probe_entry("three")]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::builtin();
    register_probe(&mut registry, "probe", log.clone());
    register_failing(&mut registry, "fail");
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let result = Runner::new(&fs, &registry, &policies, &mut facts, &power).run(Path::new(LIST));

    match result {
        Err(TasksmithError::Config(msg)) => {
            assert!(msg.contains("executing task from config path"));
            assert!(msg.contains("fail"));
        }
        other => panic!("expected Config error, got: {other:?}"),
    }

    assert_eq!(*log.lock().unwrap(), vec!["probe:one"]);
    let remaining = tasklist::load(&fs, Path::new(LIST)).unwrap();
    assert_eq!(remaining, vec![failing, probe_entry("three")]);
}

#[test]
fn restart_with_retry_keeps_current_entry_persisted() {
    init_tracing();
    let fs = MockFileSystem::new();
    let reboot = reboot_entry(5, "apply updates", &[true]);
    persist(&fs, &[reboot.clone(), probe_entry("after")]);

    let registry = ActionRegistry::builtin();
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let outcome = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .run(Path::new(LIST))
        .unwrap();

    match outcome {
        RunOutcome::PowerInvoked(signal) => {
            assert_eq!(signal.kind, SignalKind::Restart);
            assert!(signal.retry_on_restart);
            assert_eq!(signal.reason, "apply updates");
        }
        other => panic!("expected PowerInvoked, got: {other:?}"),
    }

    assert_eq!(
        power.calls(),
        vec![PowerCall {
            restart: true,
            timeout_secs: 5,
            reason: "apply updates".to_string(),
        }]
    );

    // The reboot entry re-executes after the reboot.
    let remaining = tasklist::load(&fs, Path::new(LIST)).unwrap();
    assert_eq!(remaining, vec![reboot, probe_entry("after")]);
}

#[test]
fn pop_next_discards_the_following_entry_too() {
    init_tracing();
    let fs = MockFileSystem::new();
    persist(
        &fs,
        &[
            reboot_entry(0, "skip installer reboot", &[false, true]),
            probe_entry("skipped"),
            probe_entry("kept"),
        ],
    );

    let registry = ActionRegistry::builtin();
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let outcome = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .run(Path::new(LIST))
        .unwrap();
    assert!(matches!(outcome, RunOutcome::PowerInvoked(_)));

    let remaining = tasklist::load(&fs, Path::new(LIST)).unwrap();
    assert_eq!(remaining, vec![probe_entry("kept")]);
}

#[test]
fn shutdown_mid_list_persists_only_unexecuted_entries() {
    // Scenario D: probe, shutdown, probe. The shutdown pops itself; only the
    // third entry survives for the next power-on.
    init_tracing();
    let fs = MockFileSystem::new();
    persist(
        &fs,
        &[
            probe_entry("one"),
            shutdown_entry(30, "maintenance"),
            probe_entry("three"),
        ],
    );

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::builtin();
    register_probe(&mut registry, "probe", log.clone());
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let outcome = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .run(Path::new(LIST))
        .unwrap();

    match outcome {
        RunOutcome::PowerInvoked(signal) => assert_eq!(signal.kind, SignalKind::Shutdown),
        other => panic!("expected PowerInvoked, got: {other:?}"),
    }
    assert_eq!(*log.lock().unwrap(), vec!["probe:one"]);
    assert_eq!(
        power.calls(),
        vec![PowerCall {
            restart: false,
            timeout_secs: 30,
            reason: "maintenance".to_string(),
        }]
    );

    let remaining = tasklist::load(&fs, Path::new(LIST)).unwrap();
    assert_eq!(remaining, vec![probe_entry("three")]);
}

#[test]
fn signal_on_last_entry_removes_the_backing_file() {
    init_tracing();
    let fs = MockFileSystem::new();
    persist(&fs, &[reboot_entry(0, "final reboot", &[])]);

    let registry = ActionRegistry::builtin();
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let outcome = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .run(Path::new(LIST))
        .unwrap();

    assert!(matches!(outcome, RunOutcome::PowerInvoked(_)));
    // Nothing left to resume: the next boot starts a fresh compilation.
    assert!(!fs.exists(Path::new(LIST)));
}

#[test]
fn failing_policy_halts_without_config_wrapping() {
    init_tracing();
    let fs = MockFileSystem::new();
    persist(&fs, &[policy_entry(&["tpm_present"]), probe_entry("never")]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::builtin();
    register_probe(&mut registry, "probe", log.clone());
    let policies = PolicyRegistry::builtin();
    let mut facts = HostFacts::gather(&StubFactSource::default().with_tpm(false)).unwrap();
    let power = RecordingPower::new();

    let result = Runner::new(&fs, &registry, &policies, &mut facts, &power).run(Path::new(LIST));

    match result {
        Err(TasksmithError::Policy(msg)) => assert!(msg.contains("TPM")),
        other => panic!("expected Policy error, got: {other:?}"),
    }
    assert!(log.lock().unwrap().is_empty());
    // The policy entry stays queued; a compliant retry resumes from it.
    let remaining = tasklist::load(&fs, Path::new(LIST)).unwrap();
    assert_eq!(remaining.len(), 2);
}

#[test]
fn unknown_policy_name_is_its_own_error() {
    init_tracing();
    let fs = MockFileSystem::new();
    persist(&fs, &[policy_entry(&["notarized_firmware"])]);

    let registry = ActionRegistry::builtin();
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let result = Runner::new(&fs, &registry, &policies, &mut facts, &power).run(Path::new(LIST));

    match result {
        Err(TasksmithError::UnknownPolicy(name)) => assert_eq!(name, "notarized_firmware"),
        other => panic!("expected UnknownPolicy, got: {other:?}"),
    }
}

#[test]
fn passing_policies_let_execution_continue() {
    init_tracing();
    let fs = MockFileSystem::new();
    persist(
        &fs,
        &[
            policy_entry(&["tpm_present", "physical_machine"]),
            probe_entry("verified"),
        ],
    );

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::builtin();
    register_probe(&mut registry, "probe", log.clone());
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let outcome = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .run(Path::new(LIST))
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(*log.lock().unwrap(), vec!["probe:verified"]);
}

#[test]
fn preflight_failure_runs_nothing_and_leaves_the_list_intact() {
    init_tracing();
    let fs = MockFileSystem::new();
    let entries = vec![probe_entry("one"), probe_entry("two")];
    persist(&fs, &entries);

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::builtin();
    register_probe(&mut registry, "probe", log.clone());
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();
    let reachability = FakeReachability::failing_on("config.example");

    let result = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .with_preflight(
            &reachability,
            vec!["https://config.example/ping".to_string()],
        )
        .run(Path::new(LIST));

    match result {
        Err(TasksmithError::CheckUrl(msg)) => assert!(msg.contains("config.example")),
        other => panic!("expected CheckUrl error, got: {other:?}"),
    }
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(tasklist::load(&fs, Path::new(LIST)).unwrap(), entries);
}

#[test]
fn preserve_tasks_keeps_the_backing_file_after_completion() {
    init_tracing();
    let fs = MockFileSystem::new();
    persist(&fs, &[probe_entry("only")]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::builtin();
    register_probe(&mut registry, "probe", log.clone());
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let outcome = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .with_preserve_tasks(true)
        .run(Path::new(LIST))
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert!(fs.exists(Path::new(LIST)));
}

/// Action signalling a restart with a task-list handoff to a new location,
/// e.g. moving from the installer ramdisk onto the installed system drive.
struct Handoff;

impl Action for Handoff {
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn run(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Option<ControlSignal>> {
        Ok(Some(
            ControlSignal::restart(0, "handoff to installed os")
                .with_task_list_path("sysroot/task_list.yaml"),
        ))
    }
}

#[test]
fn task_list_path_override_moves_the_remainder() {
    init_tracing();
    let fs = MockFileSystem::new();
    persist(
        &fs,
        &[
            TaskListEntry::new(Vec::new(), "handoff", str_seq(&[])),
            probe_entry("rest"),
        ],
    );

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::builtin();
    register_probe(&mut registry, "probe", log.clone());
    registry.register("handoff", |_args| Box::new(Handoff));
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let outcome = Runner::new(&fs, &registry, &policies, &mut facts, &power)
        .run(Path::new(LIST))
        .unwrap();

    assert!(matches!(outcome, RunOutcome::PowerInvoked(_)));
    // Remaining work lives at the new location only.
    let moved = tasklist::load(&fs, Path::new("sysroot/task_list.yaml")).unwrap();
    assert_eq!(moved, vec![probe_entry("rest")]);
    assert!(!fs.exists(Path::new(LIST)));
}

#[test]
fn missing_task_list_is_a_config_error() {
    init_tracing();
    let fs = MockFileSystem::new();
    let registry = ActionRegistry::builtin();
    let policies = PolicyRegistry::builtin();
    let mut facts = facts();
    let power = RecordingPower::new();

    let result = Runner::new(&fs, &registry, &policies, &mut facts, &power).run(Path::new(LIST));
    match result {
        Err(TasksmithError::Config(msg)) => assert!(msg.contains("task list")),
        other => panic!("expected Config error, got: {other:?}"),
    }
}
