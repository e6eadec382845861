use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;

use super::event_log_struct::EventLog;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Projection of an event log on just activity labels
///
/// The activities form the _process domain_: they are fixed once the log is loaded and
/// indexed in case-insensitive sorted order, so that the index of an activity does not
/// depend on the order in which traces were read.
///
/// Traces are stored as variants (activity index sequences) together with their multiplicity.
pub struct EventLogActivityProjection {
    /// Activity labels, indexed by activity index
    pub activities: Vec<String>,
    /// Reverse lookup from activity label to index
    pub act_to_index: HashMap<String, usize>,
    /// Trace variants and how many traces follow each variant
    pub traces: Vec<(Vec<usize>, u64)>,
}

impl EventLogActivityProjection {
    /// Construct a projection from activity sequences (one sequence per trace)
    pub fn from_activity_sequences<I, T, S>(sequences: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let acts_per_trace: Vec<Vec<String>> = sequences
            .into_iter()
            .map(|t| t.into_iter().map(|a| a.as_ref().to_string()).collect())
            .collect();
        Self::from_traces(acts_per_trace)
    }

    fn from_traces(acts_per_trace: Vec<Vec<String>>) -> Self {
        let mut activities: Vec<String> = acts_per_trace.iter().flatten().cloned().collect();
        activities.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b)));
        activities.dedup();
        let act_to_index: HashMap<String, usize> = activities
            .iter()
            .enumerate()
            .map(|(i, act)| (act.clone(), i))
            .collect();
        let mut traces_set: BTreeMap<Vec<usize>, u64> = BTreeMap::new();
        acts_per_trace.iter().for_each(|t| {
            let trace: Vec<usize> = t.iter().map(|act| act_to_index[act]).collect();
            *traces_set.entry(trace).or_insert(0) += 1;
        });

        EventLogActivityProjection {
            activities,
            act_to_index,
            traces: traces_set.into_iter().collect(),
        }
    }

    /// Number of traces (counting every variant with its multiplicity)
    pub fn num_traces(&self) -> u64 {
        self.traces.iter().map(|(_, w)| w).sum()
    }

    /// Number of occurrences of every activity over the whole log
    pub fn activity_occurrences(&self) -> Vec<u64> {
        let mut act_count = vec![0_u64; self.activities.len()];
        self.traces.iter().for_each(|(trace, w)| {
            trace.iter().for_each(|act| {
                act_count[*act] += *w;
            })
        });
        act_count
    }

    /// Get the labels of the given activity indices (sorted)
    pub fn acts_to_names(&self, acts: &[usize]) -> Vec<String> {
        let mut ret: Vec<String> = acts
            .iter()
            .map(|act| self.activities[*act].clone())
            .collect();
        ret.sort();
        ret
    }
}

impl From<&EventLog> for EventLogActivityProjection {
    fn from(val: &EventLog) -> Self {
        let acts_per_trace: Vec<Vec<String>> = val
            .traces
            .par_iter()
            .map(|t| -> Vec<String> { t.activities().map(str::to_string).collect() })
            .collect();
        Self::from_traces(acts_per_trace)
    }
}
