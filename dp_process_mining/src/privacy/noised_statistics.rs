use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::{
    budget::{BudgetAllocation, PrivacyLedger, PrivacyQuery},
    df_matrix::DirectlyFollowsMatrix,
    mechanisms::{draw_subset_size, edge_subset_bounds, report_noisy_max, LaplaceMechanism},
    trace_statistics::DfNode,
};

/// Sensitivity of every count derived from per-trace pair sets
pub const COUNT_SENSITIVITY: f64 = 1.0;

///
/// Privacy-preserving directly-follows statistics of one sampling round
///
/// This is the only information about the event log that is ever handed to process discovery.
/// Activities are referred to by their index in the process domain.
///
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoisedStatistics {
    /// Noised counts of the privacy-selected subset of activity-to-activity edges
    #[serde_as(as = "Vec<(_, _)>")]
    pub edges: BTreeMap<(usize, usize), i64>,
    /// Noised counts of the privacy-selected start activities (all positive)
    pub start_activities: BTreeMap<usize, i64>,
    /// Noised counts of the privacy-selected end activities (all positive)
    pub end_activities: BTreeMap<usize, i64>,
}

impl NoisedStatistics {
    /// Whether nothing at all was released
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.start_activities.is_empty() && self.end_activities.is_empty()
    }

    /// Noised edge counts keyed by activity labels
    pub fn edges_by_label<'a>(&self, activities: &'a [String]) -> BTreeMap<(&'a str, &'a str), i64> {
        self.edges
            .iter()
            .map(|((a, b), v)| ((activities[*a].as_str(), activities[*b].as_str()), *v))
            .collect()
    }
}

///
/// Noise a directly-follows matrix and reduce it to privacy-selected subsets
///
/// Within one call:
/// 1. every cell is noised independently (Laplace, [`PrivacyQuery::EdgeCounts`]),
/// 2. start/end activity counts are read off the noised `Start`/`End` rows,
/// 3. random-size subsets of start and end activities are selected with Report Noisy Max
///    ([`PrivacyQuery::StartActivitySelection`], [`PrivacyQuery::EndActivitySelection`]) and
///    non-positive counts are dropped,
/// 4. the remaining activity-to-activity edges are reduced to a random-size subset, whose size
///    range only depends on already noised values ([`PrivacyQuery::EdgeSubsetSelection`]).
///
/// Every release is recorded in `ledger` under `round`. A non-positive budget for a query
/// releases nothing for it: without edge noise the result is empty, without a selection budget the
/// corresponding mapping is empty.
pub fn assemble_noised_statistics<R: Rng + ?Sized>(
    matrix: &DirectlyFollowsMatrix,
    epsilon: f64,
    allocation: &BudgetAllocation,
    rng: &mut R,
    ledger: &mut PrivacyLedger,
    round: usize,
) -> NoisedStatistics {
    let num_activities = matrix.activities().len();
    let Some(edge_mech) =
        LaplaceMechanism::new(COUNT_SENSITIVITY, allocation.budget(PrivacyQuery::EdgeCounts, epsilon))
    else {
        tracing::debug!(epsilon, "No budget for edge counts, releasing nothing");
        return NoisedStatistics::default();
    };

    // Noise everything
    let noised_matrix: BTreeMap<_, i64> = matrix
        .iter()
        .map(|(pair, count)| (*pair, edge_mech.add_noise_to_count(*count, rng)))
        .collect();
    ledger.charge(round, PrivacyQuery::EdgeCounts, edge_mech.epsilon());

    // Start and end activities from the noised boundary rows
    let mut start_activities: BTreeMap<usize, i64> = (0..num_activities).map(|a| (a, 0)).collect();
    let mut end_activities: BTreeMap<usize, i64> = (0..num_activities).map(|a| (a, 0)).collect();
    let mut edges: BTreeMap<(usize, usize), i64> = BTreeMap::new();
    for (pair, value) in &noised_matrix {
        match pair {
            (DfNode::Start, DfNode::Activity(a)) => *start_activities.entry(*a).or_default() += value,
            (DfNode::Activity(a), DfNode::End) => *end_activities.entry(*a).or_default() += value,
            (DfNode::Activity(a), DfNode::Activity(b)) => {
                edges.insert((*a, *b), *value);
            }
            _ => {}
        }
    }

    let start_activities = select_positive_subset(
        &start_activities,
        allocation,
        PrivacyQuery::StartActivitySelection,
        epsilon,
        rng,
        ledger,
        round,
    );
    let end_activities = select_positive_subset(
        &end_activities,
        allocation,
        PrivacyQuery::EndActivitySelection,
        epsilon,
        rng,
        ledger,
        round,
    );

    // Subset of all activity-to-activity behavior
    let edge_budget = allocation.budget(PrivacyQuery::EdgeSubsetSelection, epsilon);
    let edges = if edge_budget > 0.0 && edge_budget.is_finite() {
        let positive = edges.values().filter(|v| **v > 0).count();
        let (lower, upper) = edge_subset_bounds(positive, num_activities);
        let size = draw_subset_size(rng, lower, upper);
        ledger.charge(round, PrivacyQuery::EdgeSubsetSelection, edge_budget);
        report_noisy_max(&edges, size)
    } else {
        BTreeMap::new()
    };

    NoisedStatistics {
        edges,
        start_activities,
        end_activities,
    }
}

/// Report Noisy Max on a random-size subset of activities, keeping only positive counts
fn select_positive_subset<R: Rng + ?Sized>(
    counts: &BTreeMap<usize, i64>,
    allocation: &BudgetAllocation,
    query: PrivacyQuery,
    epsilon: f64,
    rng: &mut R,
    ledger: &mut PrivacyLedger,
    round: usize,
) -> BTreeMap<usize, i64> {
    let budget = allocation.budget(query, epsilon);
    if !(budget > 0.0 && budget.is_finite()) {
        return BTreeMap::new();
    }
    let size = draw_subset_size(rng, 1, counts.len());
    ledger.charge(round, query, budget);
    report_noisy_max(counts, size)
        .into_iter()
        .filter(|(_, v)| *v > 0)
        .collect()
}
