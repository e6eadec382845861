use std::collections::{BTreeMap, BTreeSet};

use itertools::iproduct;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::trace_statistics::{extract_log_pairs, DfNode, DfPair};
use crate::event_log::activity_projection::EventLogActivityProjection;

///
/// Frequency table over the full directly-follows space of a process domain
///
/// The key space is materialized eagerly and never depends on the data: it is exactly
/// `activities × activities`, plus `(Start, a)` and `(a, End)` for every activity `a`.
/// Cells that were never observed hold `0`.
///
/// Counts are built from per-trace pair sets, so every trace contributes at most 1 to each cell.
///
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectlyFollowsMatrix {
    activities: Vec<String>,
    #[serde_as(as = "Vec<(_, _)>")]
    counts: BTreeMap<DfPair, u64>,
}

impl DirectlyFollowsMatrix {
    /// All keys of the directly-follows space over `num_activities` activities
    pub fn key_space(num_activities: usize) -> impl Iterator<Item = DfPair> {
        let n = num_activities;
        iproduct!(0..n, 0..n)
            .map(|(a, b)| (DfNode::Activity(a), DfNode::Activity(b)))
            .chain((0..n).map(|a| (DfNode::Start, DfNode::Activity(a))))
            .chain((0..n).map(|a| (DfNode::Activity(a), DfNode::End)))
    }

    /// Create a matrix with every cell of the key space set to zero
    pub fn zeroed(activities: Vec<String>) -> Self {
        let counts = Self::key_space(activities.len()).map(|k| (k, 0)).collect();
        Self { activities, counts }
    }

    /// Sum up per-trace pair sets (each with a multiplicity) into a matrix
    ///
    /// Pairs outside of the key space (e.g., referring to unknown activity indices) are ignored.
    pub fn from_pair_sets<I>(activities: Vec<String>, pair_sets: I) -> Self
    where
        I: IntoIterator<Item = (BTreeSet<DfPair>, u64)>,
    {
        let mut matrix = Self::zeroed(activities);
        for (pairs, w) in pair_sets {
            for pair in pairs {
                if let Some(count) = matrix.counts.get_mut(&pair) {
                    *count += w;
                }
            }
        }
        matrix
    }

    /// Build the matrix of an event log (projection)
    pub fn from_log(log: &EventLogActivityProjection) -> Self {
        Self::from_pair_sets(log.activities.clone(), extract_log_pairs(log))
    }

    /// The process domain this matrix is defined over
    pub fn activities(&self) -> &[String] {
        &self.activities
    }

    /// Count of a pair; `0` for pairs outside of the key space
    pub fn get(&self, pair: &DfPair) -> u64 {
        self.counts.get(pair).copied().unwrap_or(0)
    }

    /// Count of a pair given by labels (use [`START_ACTIVITY`](super::trace_statistics::START_ACTIVITY)
    /// and [`END_ACTIVITY`](super::trace_statistics::END_ACTIVITY) for the markers)
    ///
    /// Activity labels take precedence: an activity that happens to be called like a marker
    /// resolves to the activity. Use [`DirectlyFollowsMatrix::get`] to address markers
    /// unambiguously.
    pub fn get_by_label(&self, from: &str, to: &str) -> u64 {
        let node = |label: &str, marker: DfNode| {
            self.activities
                .iter()
                .position(|a| a == label)
                .map(DfNode::Activity)
                .or_else(|| (label == marker.label(&self.activities)).then_some(marker))
        };
        match (node(from, DfNode::Start), node(to, DfNode::End)) {
            (Some(a), Some(b)) => self.get(&(a, b)),
            _ => 0,
        }
    }

    /// Iterate over all cells in key order
    pub fn iter(&self) -> impl Iterator<Item = (&DfPair, &u64)> + '_ {
        self.counts.iter()
    }

    /// Number of cells (size of the key space)
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the key space is empty (no activities)
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::privacy::trace_statistics::{END_ACTIVITY, START_ACTIVITY};

    #[test]
    fn matrix_of_three_activity_log() {
        let log = EventLogActivityProjection::from_activity_sequences(vec![
            vec!["A", "B", "C"],
            vec!["A", "C"],
        ]);
        let matrix = DirectlyFollowsMatrix::from_log(&log);
        assert_eq!(matrix.len(), 15);
        assert_eq!(matrix.get_by_label(START_ACTIVITY, "A"), 2);
        assert_eq!(matrix.get_by_label("A", "B"), 1);
        assert_eq!(matrix.get_by_label("B", "C"), 1);
        assert_eq!(matrix.get_by_label("A", "C"), 1);
        assert_eq!(matrix.get_by_label("C", END_ACTIVITY), 2);
        assert_eq!(matrix.get_by_label("B", END_ACTIVITY), 0);
        assert_eq!(matrix.get_by_label("C", "A"), 0);
        assert_eq!(matrix.iter().map(|(_, c)| c).sum::<u64>(), 7);
    }

    #[test]
    fn repeated_behavior_counts_once_per_trace() {
        let log = EventLogActivityProjection::from_activity_sequences(vec![
            vec!["A", "B", "A", "B", "A", "B"],
            vec!["A", "B"],
        ]);
        let matrix = DirectlyFollowsMatrix::from_log(&log);
        assert_eq!(matrix.get_by_label("A", "B"), 2);
        assert_eq!(matrix.get_by_label("B", "A"), 1);
    }

    #[test]
    fn unknown_pairs_are_zero() {
        let matrix = DirectlyFollowsMatrix::zeroed(vec!["A".into()]);
        assert_eq!(matrix.get(&(DfNode::Activity(3), DfNode::End)), 0);
        assert_eq!(matrix.get_by_label("X", "A"), 0);
        assert!(DirectlyFollowsMatrix::zeroed(vec![]).is_empty());
    }

    #[test]
    fn activity_named_like_marker() {
        let log = EventLogActivityProjection::from_activity_sequences(vec![
            vec![START_ACTIVITY, "A"],
            vec!["A", END_ACTIVITY],
        ]);
        let matrix = DirectlyFollowsMatrix::from_log(&log);
        assert_eq!(matrix.get_by_label(START_ACTIVITY, "A"), 1);
        assert_eq!(matrix.get_by_label("A", END_ACTIVITY), 1);
        assert_eq!(matrix.get_by_label(START_ACTIVITY, END_ACTIVITY), 0);
        let start_a = matrix
            .activities()
            .iter()
            .position(|a| a == START_ACTIVITY)
            .map(DfNode::Activity)
            .unwrap();
        assert_eq!(matrix.get(&(DfNode::Start, start_a)), 1);
    }

    #[test]
    fn serialize_matrix() {
        let matrix = DirectlyFollowsMatrix::zeroed(vec!["A".into()]);
        let json = serde_json::to_string(&matrix).unwrap();
        let back: DirectlyFollowsMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(matrix, back);
    }

    proptest! {
        #[test]
        fn key_space_is_independent_of_data(
            traces in proptest::collection::vec(proptest::collection::vec(0usize..4, 0..8), 0..10)
        ) {
            let activities: Vec<String> = (0..4).map(|i| format!("act{i}")).collect();
            let sequences: Vec<Vec<&str>> = traces
                .iter()
                .map(|t| t.iter().map(|a| activities[*a].as_str()).collect())
                .collect();
            let mut log = EventLogActivityProjection::from_activity_sequences(sequences);
            // fix the process domain to all four activities
            log.activities = activities.clone();
            log.traces = traces
                .iter()
                .map(|t| (t.clone(), 1))
                .collect();
            let matrix = DirectlyFollowsMatrix::from_log(&log);
            let keys: BTreeSet<DfPair> = matrix.iter().map(|(k, _)| *k).collect();
            let expected: BTreeSet<DfPair> = DirectlyFollowsMatrix::key_space(4).collect();
            prop_assert_eq!(keys, expected);
            prop_assert_eq!(matrix.len(), 4 * 4 + 2 * 4);
            for (_, count) in matrix.iter() {
                prop_assert!(*count <= traces.len() as u64);
            }
        }
    }
}
