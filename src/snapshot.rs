//! Result snapshot (C7): an immutable view produced by `stop`, holding
//! ownership of everything the engine accumulated.

use crate::measurement::Measurement;
use crate::method_table::MethodRecord;
use crate::task::TaskRegistry;

/// One task's flat collection of method records, each carrying its own
/// parent/child edge tables.
#[derive(Debug)]
pub struct TaskSnapshot {
    pub task_id: u64,
    pub methods: Vec<MethodRecord>,
}

/// Immutable snapshot of a completed profiling run. Owns all data it
/// holds (it borrows nothing from the engine, which has already released
/// its own registry by the time this is constructed), plus the
/// measurement that timed the run, needed to convert the raw counters
/// every record holds into seconds via the `*_seconds` accessors on
/// [`MethodRecord`]/[`crate::edge::EdgeRecord`].
#[derive(Debug)]
pub struct Snapshot {
    tasks: Vec<TaskSnapshot>,
    measurement: Measurement,
}

impl Snapshot {
    pub(crate) fn from_registry<H: std::hash::Hash + Eq + Clone>(
        registry: TaskRegistry<H>,
        measurement: Measurement,
    ) -> Self {
        let tasks = registry
            .into_tasks()
            .map(|(_, state)| TaskSnapshot { task_id: state.task_id, methods: state.methods.into_records() })
            .collect();
        Self { tasks, measurement }
    }

    /// Iterate over every task's `(task_id, method records)`.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSnapshot> {
        self.tasks.iter()
    }

    #[must_use]
    pub fn task(&self, task_id: u64) -> Option<&TaskSnapshot> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// The measurement that timed this run, for converting any record's or
    /// edge's raw counters into seconds.
    #[must_use]
    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Ordering for [`MethodRecord`] in a sorted report: a record with
/// `called == 0` sinks to the bottom; otherwise larger `total_time` sorts
/// first.
#[must_use]
pub fn compare_methods(a: &MethodRecord, b: &MethodRecord) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.called == 0, b.called == 0) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_time.cmp(&a.total_time),
    }
}
