//! Integration tests exercising the public `Profiler` API end to end
//! through a `MockBridge`, the test double a host embedding this crate
//! would substitute for its real interpreter hooks.

use profiler_core::{Event, EventKind, HostBridge, MeasurementMode, Profiler, ProfilerError};

#[derive(Clone, PartialEq, Eq)]
struct MockRef(u64);

/// A `HostBridge` standing in for a real dynamic-language interpreter:
/// one sentinel value for the profiler's own module, and one hardcoded
/// included-module proxy (`class 50` normalizes to `class 5`).
struct MockBridge;

impl HostBridge for MockBridge {
    type TaskHandle = u64;
    type SelfRef = MockRef;

    fn profiler_sentinel(&self) -> Self::SelfRef {
        MockRef(u64::MAX)
    }

    fn is_included_module_proxy(&self, class_handle: u64) -> bool {
        class_handle == 50
    }

    fn resolve_real_class(&self, _class_handle: u64) -> u64 {
        5
    }
}

fn call(task: u64, class: u64, method: u64, line: u32) -> Event<MockBridge> {
    Event {
        kind: EventKind::Call,
        self_ref: MockRef(0),
        class_handle: class,
        method_id: method,
        source_file: Some("script.rb".into()),
        source_line: line,
        task_handle: task,
    }
}

fn ret(task: u64) -> Event<MockBridge> {
    Event {
        kind: EventKind::Return,
        self_ref: MockRef(0),
        class_handle: 0,
        method_id: 0,
        source_file: None,
        source_line: 0,
        task_handle: task,
    }
}

#[test]
fn a_full_run_produces_a_populated_snapshot() {
    let mut profiler = Profiler::new();
    profiler.start(MockBridge).unwrap();

    profiler.on_event(call(1, 1, 1, 10)); // outer
    profiler.on_event(call(1, 2, 2, 20)); // inner
    profiler.on_event(ret(1));
    profiler.on_event(ret(1));

    let snapshot = profiler.stop().unwrap();
    assert_eq!(snapshot.len(), 1);

    let task = snapshot.task(0).unwrap();
    assert_eq!(task.methods.len(), 2);
    let outer = task.methods.iter().find(|m| m.method_id == 1).unwrap();
    assert_eq!(outer.called, 1);
    assert!(outer.children_time() > 0);
}

#[test]
fn start_and_stop_are_not_reentrant() {
    let mut profiler: Profiler<MockBridge> = Profiler::new();
    assert_eq!(profiler.stop().unwrap_err(), ProfilerError::NotRunning);

    profiler.start(MockBridge).unwrap();
    assert_eq!(profiler.start(MockBridge).unwrap_err(), ProfilerError::AlreadyRunning);

    profiler.stop().unwrap();
    assert_eq!(profiler.stop().unwrap_err(), ProfilerError::NotRunning);
}

#[test]
fn included_module_proxies_are_normalized_before_accounting() {
    let mut profiler = Profiler::new();
    profiler.start(MockBridge).unwrap();

    profiler.on_event(call(1, 50, 7, 1)); // reported as proxy class 50
    profiler.on_event(ret(1));

    let snapshot = profiler.stop().unwrap();
    let task = snapshot.task(0).unwrap();
    assert_eq!(task.methods.len(), 1);
    assert_eq!(task.methods[0].class_handle, 5); // normalized, not 50
}

#[test]
fn default_measurement_mode_is_wall_time() {
    let profiler: Profiler<MockBridge> = Profiler::new();
    assert_eq!(profiler.get_measurement(), MeasurementMode::WallTime);
}

#[test]
fn switching_to_process_time_then_back_is_allowed_while_stopped() {
    let mut profiler: Profiler<MockBridge> = Profiler::new();
    profiler.set_measurement(MeasurementMode::ProcessTime).unwrap();
    assert_eq!(profiler.get_measurement(), MeasurementMode::ProcessTime);
    profiler.set_measurement(MeasurementMode::WallTime).unwrap();
    assert_eq!(profiler.get_measurement(), MeasurementMode::WallTime);
}

#[test]
fn two_independent_tasks_each_get_their_own_snapshot_entry() {
    let mut profiler = Profiler::new();
    profiler.start(MockBridge).unwrap();

    profiler.on_event(call(1, 1, 1, 0));
    profiler.on_event(ret(1));
    profiler.on_event(call(2, 2, 2, 0));
    profiler.on_event(ret(2));

    let snapshot = profiler.stop().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.tasks().all(|t| t.methods.len() == 1));
}
