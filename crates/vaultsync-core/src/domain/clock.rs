//! Vector clocks for causal ordering
//!
//! A [`VectorClock`] maps device ids to monotonically non-decreasing
//! counters. Comparing two clocks tells us whether one edit history causally
//! contains the other, or whether the two histories are concurrent (edited
//! on both sides since the last common sync).
//!
//! All operations are pure and deterministic; no wall-clock time is involved.
//! Counters are unsigned, so negative input is rejected at the serde
//! boundary before a clock can ever be constructed from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::newtypes::DeviceId;

/// Outcome of comparing two vector clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    /// Identical entry sets
    Equal,
    /// The left clock causally contains the right one
    Dominates,
    /// The right clock causally contains the left one
    Dominated,
    /// Neither contains the other: concurrent edits
    Concurrent,
}

/// Per-device logical counters
///
/// A device only ever increments its own entry; counters never decrease.
/// The map representation is a `BTreeMap` so serialization order is
/// deterministic across devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock(BTreeMap<DeviceId, u64>);

impl VectorClock {
    /// Creates an empty clock (no recorded edits)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter for a device, treating a missing entry as 0
    #[must_use]
    pub fn get(&self, device: &DeviceId) -> u64 {
        self.0.get(device).copied().unwrap_or(0)
    }

    /// Returns true if no device has recorded an edit
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy with the given device's counter incremented by one
    #[must_use]
    pub fn incremented(&self, device: &DeviceId) -> Self {
        let mut next = self.clone();
        *next.0.entry(device.clone()).or_insert(0) += 1;
        next
    }

    /// Returns the entrywise maximum of two clocks
    ///
    /// Commutative and idempotent; the merge of two histories causally
    /// contains both inputs.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.0.clone();
        for (device, counter) in &other.0 {
            let entry = merged.entry(device.clone()).or_insert(0);
            if *counter > *entry {
                *entry = *counter;
            }
        }
        Self(merged)
    }

    /// Compares two clocks for causal ordering
    pub fn compare(&self, other: &Self) -> ClockOrdering {
        let mut self_ahead = false;
        let mut other_ahead = false;

        for device in self.0.keys().chain(other.0.keys()) {
            let a = self.get(device);
            let b = other.get(device);
            if a > b {
                self_ahead = true;
            } else if b > a {
                other_ahead = true;
            }
        }

        match (self_ahead, other_ahead) {
            (false, false) => ClockOrdering::Equal,
            (true, false) => ClockOrdering::Dominates,
            (false, true) => ClockOrdering::Dominated,
            (true, true) => ClockOrdering::Concurrent,
        }
    }

    /// Returns true if this clock strictly dominates the other
    ///
    /// Strict: equal clocks do not dominate each other.
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        matches!(self.compare(other), ClockOrdering::Dominates)
    }

    /// Returns true if the two clocks are concurrent
    #[must_use]
    pub fn concurrent_with(&self, other: &Self) -> bool {
        matches!(self.compare(other), ClockOrdering::Concurrent)
    }
}

impl<const N: usize> From<[(DeviceId, u64); N]> for VectorClock {
    fn from(entries: [(DeviceId, u64); N]) -> Self {
        Self(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> DeviceId {
        DeviceId::new(name).unwrap()
    }

    fn clock(entries: &[(&str, u64)]) -> VectorClock {
        VectorClock(
            entries
                .iter()
                .map(|(d, c)| (device(d), *c))
                .collect(),
        )
    }

    #[test]
    fn test_compare_equal_to_self() {
        let a = clock(&[("a", 3), ("b", 1)]);
        assert_eq!(a.compare(&a), ClockOrdering::Equal);
    }

    #[test]
    fn test_compare_missing_entry_is_zero() {
        let a = clock(&[("a", 1)]);
        let b = clock(&[("a", 1), ("b", 0)]);
        assert_eq!(a.compare(&b), ClockOrdering::Equal);
    }

    #[test]
    fn test_compare_dominates() {
        let a = clock(&[("a", 2), ("b", 1)]);
        let b = clock(&[("a", 1), ("b", 1)]);
        assert_eq!(a.compare(&b), ClockOrdering::Dominates);
        assert_eq!(b.compare(&a), ClockOrdering::Dominated);
        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
    }

    #[test]
    fn test_compare_concurrent() {
        let a = clock(&[("a", 2), ("b", 1)]);
        let b = clock(&[("a", 1), ("b", 2)]);
        assert_eq!(a.compare(&b), ClockOrdering::Concurrent);
        assert_eq!(b.compare(&a), ClockOrdering::Concurrent);
        assert!(a.concurrent_with(&b));
    }

    #[test]
    fn test_compare_consistent_inverses() {
        let cases = [
            (clock(&[("a", 1)]), clock(&[("a", 2)])),
            (clock(&[("a", 1)]), clock(&[("b", 1)])),
            (clock(&[]), clock(&[("a", 1)])),
            (clock(&[("a", 1), ("b", 2)]), clock(&[("a", 1), ("b", 2)])),
        ];
        for (a, b) in &cases {
            let forward = a.compare(b);
            let backward = b.compare(a);
            let expected = match forward {
                ClockOrdering::Equal => ClockOrdering::Equal,
                ClockOrdering::Dominates => ClockOrdering::Dominated,
                ClockOrdering::Dominated => ClockOrdering::Dominates,
                ClockOrdering::Concurrent => ClockOrdering::Concurrent,
            };
            assert_eq!(backward, expected);
        }
    }

    #[test]
    fn test_merge_commutative() {
        let a = clock(&[("a", 2), ("b", 1)]);
        let b = clock(&[("a", 1), ("c", 4)]);
        assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn test_merge_idempotent() {
        let a = clock(&[("a", 2), ("b", 1)]);
        assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn test_merge_dominates_both_inputs_or_equals() {
        let a = clock(&[("a", 2), ("b", 1)]);
        let b = clock(&[("a", 1), ("b", 3)]);
        let merged = a.merge(&b);
        assert!(matches!(
            merged.compare(&a),
            ClockOrdering::Dominates | ClockOrdering::Equal
        ));
        assert!(matches!(
            merged.compare(&b),
            ClockOrdering::Dominates | ClockOrdering::Equal
        ));
    }

    #[test]
    fn test_increment_always_dominates_original() {
        let a = clock(&[("a", 2), ("b", 1)]);
        let bumped = a.incremented(&device("a"));
        assert!(bumped.dominates(&a));
        assert_eq!(bumped.get(&device("a")), 3);
    }

    #[test]
    fn test_increment_from_missing_entry() {
        let a = VectorClock::new();
        let bumped = a.incremented(&device("new"));
        assert_eq!(bumped.get(&device("new")), 1);
        assert!(bumped.dominates(&a));
    }

    #[test]
    fn test_serde_rejects_negative_counters() {
        let result: Result<VectorClock, _> = serde_json::from_str(r#"{"a": -1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let a = clock(&[("a", 2), ("b", 1)]);
        let json = serde_json::to_string(&a).unwrap();
        let back: VectorClock = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn test_serialization_order_deterministic() {
        let a = clock(&[("zeta", 1), ("alpha", 2)]);
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
    }
}
