use std::collections::BTreeSet;

use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event_log::activity_projection::EventLogActivityProjection;

/// Label used for the synthetic start activity
pub const START_ACTIVITY: &str = "__START";
/// Label used for the synthetic end activity
pub const END_ACTIVITY: &str = "__END";

///
/// Node of the directly-follows space: an activity (by index) or one of the synthetic
/// start/end markers
///
/// The derived ordering (`Start` < all activities < `End`) fixes the iteration order of every
/// map keyed by [`DfPair`]s.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DfNode {
    /// Synthetic start marker, only ever a predecessor
    Start,
    /// Activity (index into the process domain)
    Activity(usize),
    /// Synthetic end marker, only ever a successor
    End,
}

impl DfNode {
    /// Label of this node, resolving activity indices in `activities`
    pub fn label<'a>(&self, activities: &'a [String]) -> &'a str {
        match self {
            DfNode::Start => START_ACTIVITY,
            DfNode::Activity(a) => activities[*a].as_str(),
            DfNode::End => END_ACTIVITY,
        }
    }

    /// Activity index, if this is not a synthetic marker
    pub fn activity(&self) -> Option<usize> {
        match self {
            DfNode::Activity(a) => Some(*a),
            _ => None,
        }
    }
}

/// Directly-follows pair (predecessor, successor)
pub type DfPair = (DfNode, DfNode);

///
/// Extract the set of directly-follows pairs of one trace
///
/// Besides every pair of adjacent activities, the pairs `(Start, first)` and `(last, End)` are
/// emitted. The result is a set: a trace contributes at most once to any pair, no matter how
/// often the pair repeats within the trace. This bounds the sensitivity of every count built from
/// these sets to 1.
///
/// Empty traces yield an empty set.
pub fn extract_trace_pairs(trace: &[usize]) -> BTreeSet<DfPair> {
    let mut pairs: BTreeSet<DfPair> = trace
        .iter()
        .tuple_windows()
        .map(|(a, b)| (DfNode::Activity(*a), DfNode::Activity(*b)))
        .collect();
    if let (Some(first), Some(last)) = (trace.first(), trace.last()) {
        pairs.insert((DfNode::Start, DfNode::Activity(*first)));
        pairs.insert((DfNode::Activity(*last), DfNode::End));
    }
    pairs
}

/// Extract the pair sets of all trace variants of a log, together with the variant multiplicity
pub fn extract_log_pairs(log: &EventLogActivityProjection) -> Vec<(BTreeSet<DfPair>, u64)> {
    log.traces
        .par_iter()
        .map(|(trace, w)| (extract_trace_pairs(trace), *w))
        .collect()
}
