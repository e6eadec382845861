use std::collections::{BTreeMap, BTreeSet};

use super::engine::{ConstructionError, DiscoveryEngine, DiscoveryInput, DiscoveryThresholds};
use crate::dfg::DirectlyFollowsGraph;

///
/// Discover a [`DirectlyFollowsGraph`] from noised directly-follows statistics
///
/// Only relations with a positive noised count are considered. They are filtered (in this order)
/// by
/// 1. pre-cleaning: relations weaker than `dfg_pre_cleaning_noise` times the strongest outgoing
///    relation of the same activity are removed,
/// 2. `min_dfg_occurrences`,
/// 3. `min_act_count`, where the count of an activity is the larger of its (kept) ingoing and
///    outgoing volume, including start/end counts,
/// 4. the dependency measure `(|a>b| - |b>a|) / (|a>b| + |b>a| + 1)` (or `|a>a| / (|a>a| + 1)` for
///    self-loops), which must exceed `dependency`.
///
/// The AND-measure and length-two-loop thresholds need statistics over windows of length two,
/// which are never released; they are accepted but have no effect here.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct DfgDiscovery;

impl DiscoveryEngine for DfgDiscovery {
    type Model = DirectlyFollowsGraph<'static>;

    fn discover(&self, input: DiscoveryInput<'_>) -> Result<Self::Model, ConstructionError> {
        let DiscoveryInput {
            statistics,
            activities,
            thresholds,
        } = input;
        let n = activities.len();
        let check_index = |a: usize| {
            if a < n {
                Ok(a)
            } else {
                Err(ConstructionError::UnknownActivity(a))
            }
        };

        let mut edges: BTreeMap<(usize, usize), u64> = BTreeMap::new();
        for ((a, b), v) in &statistics.edges {
            check_index(*a)?;
            check_index(*b)?;
            if *v > 0 {
                edges.insert((*a, *b), *v as u64);
            }
        }
        let mut starts: BTreeMap<usize, u64> = BTreeMap::new();
        for (a, v) in &statistics.start_activities {
            check_index(*a)?;
            if *v > 0 {
                starts.insert(*a, *v as u64);
            }
        }
        let mut ends: BTreeMap<usize, u64> = BTreeMap::new();
        for (a, v) in &statistics.end_activities {
            check_index(*a)?;
            if *v > 0 {
                ends.insert(*a, *v as u64);
            }
        }

        let edges = filter_edges(edges, thresholds);

        let act_counts = activity_counts(&edges, &starts, &ends);
        let kept_acts: BTreeSet<usize> = act_counts
            .iter()
            .filter(|(_, c)| **c > 0 && **c >= thresholds.min_act_count)
            .map(|(a, _)| *a)
            .collect();
        if kept_acts.is_empty() {
            return Err(ConstructionError::NoActivities);
        }

        let mut dfg = DirectlyFollowsGraph::new();
        for a in &kept_acts {
            dfg.add_activity(activities[*a].clone(), saturating_u32(act_counts[a]));
        }
        for ((a, b), v) in &edges {
            if !kept_acts.contains(a) || !kept_acts.contains(b) {
                continue;
            }
            if dependency(&edges, *a, *b) > thresholds.dependency {
                dfg.add_df_relation(
                    activities[*a].clone().into(),
                    activities[*b].clone().into(),
                    saturating_u32(*v),
                );
            }
        }
        starts
            .keys()
            .filter(|a| kept_acts.contains(*a))
            .for_each(|a| dfg.add_start_activity(activities[*a].clone()));
        ends.keys()
            .filter(|a| kept_acts.contains(*a))
            .for_each(|a| dfg.add_end_activity(activities[*a].clone()));

        if dfg.start_activities.is_empty() {
            return Err(ConstructionError::NoStartActivities);
        }
        if dfg.end_activities.is_empty() {
            return Err(ConstructionError::NoEndActivities);
        }
        let disconnected = dfg.disconnected_activities();
        if !disconnected.is_empty() {
            return Err(ConstructionError::Disconnected(
                disconnected.into_iter().map(String::from).collect(),
            ));
        }
        Ok(dfg)
    }
}

/// Pre-cleaning and minimum occurrence filter
fn filter_edges(
    edges: BTreeMap<(usize, usize), u64>,
    thresholds: &DiscoveryThresholds,
) -> BTreeMap<(usize, usize), u64> {
    let mut strongest_out: BTreeMap<usize, u64> = BTreeMap::new();
    for ((a, _), v) in &edges {
        let m = strongest_out.entry(*a).or_default();
        *m = (*m).max(*v);
    }
    edges
        .into_iter()
        .filter(|((a, _), v)| {
            let strongest = strongest_out.get(a).copied().unwrap_or_default() as f64;
            (*v as f64) >= thresholds.dfg_pre_cleaning_noise * strongest
                && *v >= thresholds.min_dfg_occurrences
        })
        .collect()
}

fn activity_counts(
    edges: &BTreeMap<(usize, usize), u64>,
    starts: &BTreeMap<usize, u64>,
    ends: &BTreeMap<usize, u64>,
) -> BTreeMap<usize, u64> {
    let mut ingoing: BTreeMap<usize, u64> = starts.clone();
    let mut outgoing: BTreeMap<usize, u64> = ends.clone();
    for ((a, b), v) in edges {
        *outgoing.entry(*a).or_default() += v;
        *ingoing.entry(*b).or_default() += v;
    }
    let mut counts = ingoing;
    for (a, v) in outgoing {
        let c = counts.entry(a).or_default();
        *c = (*c).max(v);
    }
    counts
}

/// Dependency measure of `a -> b`
fn dependency(edges: &BTreeMap<(usize, usize), u64>, a: usize, b: usize) -> f64 {
    let ab = edges.get(&(a, b)).copied().unwrap_or_default() as f64;
    if a == b {
        return ab / (ab + 1.0);
    }
    let ba = edges.get(&(b, a)).copied().unwrap_or_default() as f64;
    (ab - ba) / (ab + ba + 1.0)
}

fn saturating_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}
