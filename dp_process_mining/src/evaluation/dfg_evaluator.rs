use std::collections::HashMap;

use itertools::Itertools;

use super::metrics::{EvaluationError, ModelEvaluator, QualityMetric};
use crate::{dfg::DirectlyFollowsGraph, event_log::activity_projection::EventLogActivityProjection};

/// Arc of a [`DirectlyFollowsGraph`] including the implicit start and end arcs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Move<'l> {
    Start(&'l str),
    Follows(&'l str, &'l str),
    End(&'l str),
}

impl Move<'_> {
    fn allowed_in(&self, dfg: &DirectlyFollowsGraph<'_>) -> bool {
        match self {
            Move::Start(a) => dfg.is_start_activity(a),
            Move::End(a) => dfg.is_end_activity(a),
            Move::Follows(a, b) => {
                dfg.contains_activity(a)
                    && dfg.contains_activity(b)
                    && dfg.df_frequency(a, b).is_some()
            }
        }
    }
}

/// All moves needed to replay a trace; `None` for the empty trace
fn trace_moves<'l>(log: &'l EventLogActivityProjection, trace: &[usize]) -> Option<Vec<Move<'l>>> {
    let first = trace.first()?;
    let last = trace.last()?;
    let name = move |a: &usize| log.activities[*a].as_str();
    let mut moves = vec![Move::Start(name(first))];
    moves.extend(
        trace
            .iter()
            .tuple_windows()
            .map(|(a, b)| Move::Follows(name(a), name(b))),
    );
    moves.push(Move::End(name(last)));
    Some(moves)
}

///
/// Evaluates [`DirectlyFollowsGraph`]s against an event log projection
///
/// - _Fitness_: per trace, the fraction of its moves (start, directly-follows steps, end) the
///   graph allows; averaged over all traces. Empty traces cannot be replayed and score 0.
/// - _Precision_: fraction of the graph's arcs (including start/end arcs) observed in the log.
/// - _Simplicity_: `1 / (1 + max(0, mean degree - 2))`, with artificial start/end nodes.
/// - _Generalization_: `1 - mean(1 / sqrt(#occurrences))` over all arcs; unobserved arcs count 1.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct DfgEvaluator;

impl DfgEvaluator {
    fn fitness(&self, log: &EventLogActivityProjection, dfg: &DirectlyFollowsGraph<'_>) -> f64 {
        let weighted: f64 = log
            .traces
            .iter()
            .map(|(trace, w)| {
                let trace_fitness = match trace_moves(log, trace) {
                    Some(moves) => {
                        let allowed = moves.iter().filter(|m| m.allowed_in(dfg)).count();
                        allowed as f64 / moves.len() as f64
                    }
                    None => 0.0,
                };
                trace_fitness * *w as f64
            })
            .sum();
        weighted / log.num_traces() as f64
    }

    /// Number of times each move occurs in the log
    fn move_occurrences<'l>(log: &'l EventLogActivityProjection) -> HashMap<Move<'l>, u64> {
        let mut occurrences: HashMap<Move<'l>, u64> = HashMap::new();
        for (trace, w) in &log.traces {
            for m in trace_moves(log, trace).unwrap_or_default() {
                *occurrences.entry(m).or_default() += w;
            }
        }
        occurrences
    }

    /// Arcs of the model in sorted order, so that sums over them do not depend on hashing
    fn model_moves<'m>(dfg: &'m DirectlyFollowsGraph<'_>) -> Vec<Move<'m>> {
        dfg.start_activities
            .iter()
            .map(|a| Move::Start(a.as_str()))
            .chain(
                dfg.directly_follows_relations
                    .keys()
                    .map(|(a, b)| Move::Follows(a.as_ref(), b.as_ref())),
            )
            .chain(dfg.end_activities.iter().map(|a| Move::End(a.as_str())))
            .sorted()
            .collect()
    }

    fn precision(&self, log: &EventLogActivityProjection, dfg: &DirectlyFollowsGraph<'_>) -> f64 {
        let observed = Self::move_occurrences(log);
        let arcs = Self::model_moves(dfg);
        let seen = arcs.iter().filter(|m| observed.contains_key(*m)).count();
        seen as f64 / arcs.len() as f64
    }

    fn simplicity(&self, dfg: &DirectlyFollowsGraph<'_>) -> f64 {
        let nodes = dfg.activities.len() + 2;
        let arcs = Self::model_moves(dfg).len();
        let mean_degree = 2.0 * arcs as f64 / nodes as f64;
        1.0 / (1.0 + (mean_degree - 2.0).max(0.0))
    }

    fn generalization(
        &self,
        log: &EventLogActivityProjection,
        dfg: &DirectlyFollowsGraph<'_>,
    ) -> f64 {
        let observed = Self::move_occurrences(log);
        let arcs = Self::model_moves(dfg);
        let penalty: f64 = arcs
            .iter()
            .map(|m| match observed.get(m) {
                Some(occ) if *occ > 0 => 1.0 / (*occ as f64).sqrt(),
                _ => 1.0,
            })
            .sum();
        1.0 - penalty / arcs.len() as f64
    }
}

impl ModelEvaluator<DirectlyFollowsGraph<'_>> for DfgEvaluator {
    fn evaluate(
        &self,
        log: &EventLogActivityProjection,
        model: &DirectlyFollowsGraph<'_>,
        metric: QualityMetric,
    ) -> Result<f64, EvaluationError> {
        if log.num_traces() == 0 {
            return Err(EvaluationError::EmptyLog);
        }
        let value = match metric {
            QualityMetric::Fitness => self.fitness(log, model),
            QualityMetric::Precision => self.precision(log, model),
            QualityMetric::Simplicity => self.simplicity(model),
            QualityMetric::Generalization => self.generalization(log, model),
        };
        if value.is_finite() {
            Ok(value.clamp(0.0, 1.0))
        } else {
            Err(EvaluationError::InvalidScore { metric, value })
        }
    }
}
