//! Method table (C3): per-task mapping from method-identity key to method
//! record. Arena-indexed: records live in a `Vec` and are referenced by
//! integer index rather than by pointer, so the cyclic method/edge graph
//! never needs reference counting.

use std::collections::HashMap;

use crate::edge::EdgeTable;
use crate::measurement::{Measurement, Raw};

/// Index of a [`MethodRecord`] within its owning task's [`MethodTable`]
/// arena. Non-owning: cheap to copy, compare, and store in edges without
/// creating reference cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MethodIndex(pub u32);

/// Compute the 64-bit method-identity key for `(class, method, depth)`.
///
/// Any injective-enough hash suffices here: collisions are the hash
/// map's problem, not ours.
#[must_use]
pub fn method_key(class_handle: u64, method_id: u64, depth: u32) -> u64 {
    class_handle
        .wrapping_mul(100)
        .wrapping_add(method_id.wrapping_mul(10))
        .wrapping_add(u64::from(depth))
}

/// Persistent aggregate for a specific `(class, method, recursion-depth)`
/// observed in one task.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MethodRecord {
    pub key: u64,
    pub class_handle: u64,
    pub method_id: u64,
    pub depth: u32,
    pub source_file: Option<String>,
    pub line: u32,
    pub called: u64,
    pub total_time: Raw,
    pub self_time: Raw,
    pub wait_time: Raw,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub parents: EdgeTable,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub children: EdgeTable,
    /// Number of live frames on the owning task's stack whose method's
    /// base is this record. Only meaningful on a depth-0 (base) record.
    pub active_frames: u32,
    /// The depth-0 record for the same `(class, method)`; self-referential
    /// when `depth == 0`.
    pub base: MethodIndex,
}

impl MethodRecord {
    fn new(
        key: u64,
        class_handle: u64,
        method_id: u64,
        depth: u32,
        source_file: Option<String>,
        line: u32,
        base: MethodIndex,
    ) -> Self {
        Self {
            key,
            class_handle,
            method_id,
            depth,
            source_file,
            line,
            called: 0,
            total_time: 0,
            self_time: 0,
            wait_time: 0,
            parents: EdgeTable::new(),
            children: EdgeTable::new(),
            active_frames: 0,
            base,
        }
    }

    /// Time spent in this method's children; derived, not stored.
    #[must_use]
    pub fn children_time(&self) -> Raw {
        self.total_time.saturating_sub(self.self_time).saturating_sub(self.wait_time)
    }

    /// `total_time`, converted to seconds by the measurement that timed it.
    #[must_use]
    pub fn total_time_seconds(&self, measurement: &Measurement) -> f64 {
        measurement.to_seconds(self.total_time)
    }

    /// `self_time`, converted to seconds by the measurement that timed it.
    #[must_use]
    pub fn self_time_seconds(&self, measurement: &Measurement) -> f64 {
        measurement.to_seconds(self.self_time)
    }

    /// `wait_time`, converted to seconds by the measurement that timed it.
    #[must_use]
    pub fn wait_time_seconds(&self, measurement: &Measurement) -> f64 {
        measurement.to_seconds(self.wait_time)
    }

    /// `children_time()`, converted to seconds by the measurement that timed it.
    #[must_use]
    pub fn children_time_seconds(&self, measurement: &Measurement) -> f64 {
        measurement.to_seconds(self.children_time())
    }
}

/// Per-task mapping from method key to method record. Entries are owned
/// by the task and never removed during profiling; the stack's frames
/// refer to entries by [`MethodIndex`], never by raw pointer.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    records: Vec<MethodRecord>,
    by_key: HashMap<u64, MethodIndex>,
}

impl MethodTable {
    #[must_use]
    pub fn new() -> Self {
        Self { records: Vec::new(), by_key: HashMap::new() }
    }

    #[must_use]
    pub fn get(&self, index: MethodIndex) -> &MethodRecord {
        &self.records[index.0 as usize]
    }

    pub fn get_mut(&mut self, index: MethodIndex) -> &mut MethodRecord {
        &mut self.records[index.0 as usize]
    }

    #[must_use]
    pub fn lookup(&self, key: u64) -> Option<MethodIndex> {
        self.by_key.get(&key).copied()
    }

    /// Get or create the depth-0 (base) record for `(class, method)`.
    /// `source_file`/`line` are recorded only on first observation and
    /// never mutated afterward.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_or_create_base(
        &mut self,
        class_handle: u64,
        method_id: u64,
        source_file: Option<String>,
        line: u32,
    ) -> MethodIndex {
        let key = method_key(class_handle, method_id, 0);
        if let Some(idx) = self.by_key.get(&key) {
            return *idx;
        }
        let idx = MethodIndex(self.records.len() as u32);
        self.records.push(MethodRecord::new(key, class_handle, method_id, 0, source_file, line, idx));
        self.by_key.insert(key, idx);
        idx
    }

    /// Get or create a depth-`d` (`d > 0`) record for a recursive entry,
    /// pointing its `base` back at the depth-0 record.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_or_create_recursive(&mut self, base: MethodIndex, depth: u32) -> MethodIndex {
        let base_record = self.get(base);
        let key = method_key(base_record.class_handle, base_record.method_id, depth);
        if let Some(idx) = self.by_key.get(&key) {
            return *idx;
        }
        let class_handle = base_record.class_handle;
        let method_id = base_record.method_id;
        let source_file = base_record.source_file.clone();
        let line = base_record.line;
        let idx = MethodIndex(self.records.len() as u32);
        self.records.push(MethodRecord::new(key, class_handle, method_id, depth, source_file, line, base));
        self.by_key.insert(key, idx);
        idx
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<MethodRecord> {
        self.records
    }
}
