//! Consistency weighting of edge nodes.
//!
//! The weight of an (edge, function) pair is its observed failure rate and is
//! used as a multiplicative penalty on predicted latency. Pairs without data
//! get [`NEUTRAL_WEIGHT`], which is also what a 50% failure rate produces;
//! the two cases are deliberately indistinguishable to the exploit step.

use std::collections::BTreeMap;

use crate::types::ConsistencyRecord;

/// Weight used when no attempts are recorded for an (edge, function) pair.
pub const NEUTRAL_WEIGHT: f64 = 0.5;

/// Consistency weight of a single record.
///
/// Returns the failure rate, or [`NEUTRAL_WEIGHT`] when the record is missing
/// or has no attempts.
#[must_use]
pub fn consistency_weight(record: Option<&ConsistencyRecord>) -> f64 {
    record
        .and_then(ConsistencyRecord::failure_rate)
        .unwrap_or(NEUTRAL_WEIGHT)
}

/// Per-function counters.
pub type FunctionStats = BTreeMap<String, ConsistencyRecord>;

/// Per-(edge, function) counters, keyed edge first.
pub type EdgeFunctionStats = BTreeMap<String, BTreeMap<String, ConsistencyRecord>>;

/// Layered lookup into edge/function counters.
///
/// `None` for an unknown edge or an unknown function under a known edge.
/// Keys are expected to be normalised already.
#[must_use]
pub fn edge_record(stats: &EdgeFunctionStats, edge: &str, function: &str) -> Option<ConsistencyRecord> {
    stats
        .get(edge)
        .and_then(|functions| functions.get(function))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> EdgeFunctionStats {
        let mut stats = EdgeFunctionStats::new();
        stats
            .entry("edge-a".to_owned())
            .or_default()
            .insert("f1".to_owned(), ConsistencyRecord::new(10, 8, 2));
        stats
            .entry("edge-a".to_owned())
            .or_default()
            .insert("idle".to_owned(), ConsistencyRecord::new(0, 0, 0));
        stats
    }

    fn weight(edge: &str, function: &str) -> f64 {
        consistency_weight(edge_record(&stats(), edge, function).as_ref())
    }

    #[test]
    fn known_pair_uses_failure_rate() {
        assert_eq!(
            edge_record(&stats(), "edge-a", "f1"),
            Some(ConsistencyRecord::new(10, 8, 2))
        );
        assert!((weight("edge-a", "f1") - 0.2).abs() < 1e-12);
    }

    #[test]
    fn unknown_edge_is_neutral() {
        assert_eq!(edge_record(&stats(), "edge-z", "f1"), None);
        assert!((weight("edge-z", "f1") - NEUTRAL_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_function_is_neutral() {
        assert_eq!(edge_record(&stats(), "edge-a", "f9"), None);
        assert!((weight("edge-a", "f9") - NEUTRAL_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_attempts_is_neutral() {
        assert!(edge_record(&stats(), "edge-a", "idle").is_some());
        assert!((weight("edge-a", "idle") - NEUTRAL_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn perfect_record_weighs_zero() {
        let record = ConsistencyRecord::new(4, 4, 0);
        assert!(consistency_weight(Some(&record)).abs() < f64::EPSILON);
    }
}
