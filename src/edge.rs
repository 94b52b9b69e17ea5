//! Edge tables (C4): per-method parent/child call-relation aggregates.

use std::collections::HashMap;

use crate::measurement::{Measurement, Raw};
use crate::method_table::MethodIndex;

/// Aggregate for a directed call relation between two method records.
///
/// Owned by the enclosing method record's `parents` or `children` table.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EdgeRecord {
    /// The method record at the other end of this edge.
    pub target: MethodIndex,
    pub called: u64,
    pub total_time: Raw,
    pub self_time: Raw,
    pub wait_time: Raw,
    /// Source line in the caller at which the call occurred.
    pub line: u32,
}

impl EdgeRecord {
    fn new(target: MethodIndex, line: u32) -> Self {
        Self { target, called: 0, total_time: 0, self_time: 0, wait_time: 0, line }
    }

    /// Time spent in callees of the target below this edge; derived, not
    /// stored.
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

    fn accumulate(&mut self, total: Raw, self_time: Raw, wait: Raw, line: u32) {
        self.called += 1;
        self.total_time += total;
        self.self_time += self_time;
        self.wait_time += wait;
        self.line = line;
    }
}

/// Mapping from method key to edge record, keyed the same way as the
/// method table. Entries are never removed during profiling.
#[derive(Debug, Clone, Default)]
pub struct EdgeTable {
    edges: HashMap<u64, EdgeRecord>,
}

impl EdgeTable {
    #[must_use]
    pub fn new() -> Self {
        Self { edges: HashMap::new() }
    }

    /// Insert or update the edge to/from `other_key`, accumulating the
    /// given deltas and setting the call-site line.
    pub fn upsert(&mut self, other_key: u64, other: MethodIndex, total: Raw, self_time: Raw, wait: Raw, line: u32) {
        self.edges
            .entry(other_key)
            .or_insert_with(|| EdgeRecord::new(other, line))
            .accumulate(total, self_time, wait, line);
    }

    #[must_use]
    pub fn get(&self, key: u64) -> Option<&EdgeRecord> {
        self.edges.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &EdgeRecord)> {
        self.edges.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_accumulates_across_calls() {
        let mut table = EdgeTable::new();
        table.upsert(7, MethodIndex(3), 20, 15, 0, 11);
        table.upsert(7, MethodIndex(3), 10, 5, 2, 12);
        let edge = table.get(7).unwrap();
        assert_eq!(edge.called, 2);
        assert_eq!(edge.total_time, 30);
        assert_eq!(edge.self_time, 20);
        assert_eq!(edge.wait_time, 2);
        assert_eq!(edge.line, 12);
    }

    #[test]
    fn children_time_is_derived() {
        let mut table = EdgeTable::new();
        table.upsert(1, MethodIndex(0), 20, 12, 3, 5);
        let edge = table.get(1).unwrap();
        assert_eq!(edge.children_time(), 5);
    }

    #[test]
    fn seconds_accessors_derive_from_the_measurement() {
        let measurement = Measurement::wall_time();
        let mut table = EdgeTable::new();
        table.upsert(1, MethodIndex(0), 2_000_000, 1_500_000, 100_000, 5);
        let edge = table.get(1).unwrap();
        assert!((edge.total_time_seconds(&measurement) - 2.0).abs() < f64::EPSILON);
        assert!((edge.self_time_seconds(&measurement) - 1.5).abs() < f64::EPSILON);
        assert!((edge.wait_time_seconds(&measurement) - 0.1).abs() < f64::EPSILON);
        assert!((edge.children_time_seconds(&measurement) - 0.4).abs() < 1e-9);
    }
}
