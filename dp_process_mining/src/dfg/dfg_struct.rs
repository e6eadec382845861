use crate::event_log::activity_projection::EventLogActivityProjection;
use petgraph::{graphmap::DiGraphMap, visit::Dfs};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
};

/// Activity label in a directly-follows graph.
type Activity = String;

/// A directly-follows graph over activity labels.
///
/// Activities and directly-follows relations carry a frequency; start and end activities are
/// plain sets.
///
/// Graphs discovered from privacy-preserving statistics only carry noised frequencies and are
/// safe to release. [`DirectlyFollowsGraph::create_from_projection`] builds the exact graph of a
/// log, which is not.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectlyFollowsGraph<'a> {
    /// Activities with their frequency
    pub activities: HashMap<Activity, u32>,
    /// Directly-follows relations with their frequency
    #[serde_as(as = "Vec<(_, _)>")]
    pub directly_follows_relations: HashMap<(Cow<'a, str>, Cow<'a, str>), u32>,
    /// Activities a case may start with
    pub start_activities: HashSet<Activity>,
    /// Activities a case may end with
    pub end_activities: HashSet<Activity>,
}

impl Default for DirectlyFollowsGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DirectlyFollowsGraph<'a> {
    /// Empty graph
    pub fn new() -> Self {
        Self {
            activities: HashMap::new(),
            directly_follows_relations: HashMap::new(),
            start_activities: HashSet::new(),
            end_activities: HashSet::new(),
        }
    }

    /// Construct the exact (non-private) [`DirectlyFollowsGraph`] of an [`EventLogActivityProjection`]
    ///
    /// Frequencies count every occurrence, including repetitions within a trace.
    pub fn create_from_projection(log: &EventLogActivityProjection) -> Self {
        let mut result = Self::new();
        for (trace, w) in &log.traces {
            let w = *w as u32;
            let labels: Vec<&String> = trace.iter().map(|a| &log.activities[*a]).collect();
            labels
                .iter()
                .for_each(|act| result.add_activity((*act).clone(), w));
            labels.windows(2).for_each(|pair| {
                result.add_df_relation(pair[0].clone().into(), pair[1].clone().into(), w)
            });
            if let (Some(first), Some(last)) = (labels.first(), labels.last()) {
                result.add_start_activity((*first).clone());
                result.add_end_activity((*last).clone());
            }
        }
        result
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self).unwrap()
    }

    /// Add `frequency` occurrences of an activity (inserting it if necessary).
    pub fn add_activity(&mut self, activity: Activity, frequency: u32) {
        *self.activities.entry(activity).or_default() += frequency;
    }

    /// Mark an activity as start activity.
    pub fn add_start_activity(&mut self, activity: Activity) {
        self.start_activities.insert(activity);
    }

    /// Mark an activity as end activity.
    pub fn add_end_activity(&mut self, activity: Activity) {
        self.end_activities.insert(activity);
    }

    /// Whether the graph has a node for `activity`.
    pub fn contains_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.activities.contains_key(activity.as_ref())
    }

    /// Whether `activity` is a start activity.
    pub fn is_start_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.start_activities.contains(activity.as_ref())
    }

    /// Whether `activity` is an end activity.
    pub fn is_end_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.end_activities.contains(activity.as_ref())
    }

    /// Add `frequency` occurrences of the relation `from -> to` (inserting it if necessary).
    pub fn add_df_relation(&mut self, from: Cow<'a, str>, to: Cow<'a, str>, frequency: u32) {
        *self
            .directly_follows_relations
            .entry((from, to))
            .or_default() += frequency;
    }

    /// Whether the graph has the relation `(a, b)`.
    pub fn contains_df_relation<S: Into<Cow<'a, str>>>(&self, (a, b): (S, S)) -> bool {
        let (a, b): (Cow<'a, str>, Cow<'a, str>) = (a.into(), b.into());
        self.df_frequency(&a, &b).is_some()
    }

    /// Frequency of the relation `from -> to`, if present.
    pub fn df_frequency(&self, from: &str, to: &str) -> Option<u32> {
        let relations: &HashMap<(Cow<'_, str>, Cow<'_, str>), u32> =
            &self.directly_follows_relations;
        relations
            .get(&(Cow::Borrowed(from), Cow::Borrowed(to)))
            .copied()
    }

    /// Activities that do not lie on any path from a start activity to an end activity
    ///
    /// Returned sorted. A graph without start or end activities has all its activities
    /// returned.
    pub fn disconnected_activities(&self) -> Vec<&str> {
        let mut forward: DiGraphMap<&str, ()> = DiGraphMap::new();
        let mut backward: DiGraphMap<&str, ()> = DiGraphMap::new();
        self.activities.keys().for_each(|a| {
            forward.add_node(a.as_str());
            backward.add_node(a.as_str());
        });
        self.directly_follows_relations.keys().for_each(|(a, b)| {
            if self.contains_activity(a) && self.contains_activity(b) {
                forward.add_edge(a.as_ref(), b.as_ref(), ());
                backward.add_edge(b.as_ref(), a.as_ref(), ());
            }
        });

        let from_start = reachable_from(&forward, &self.start_activities);
        let to_end = reachable_from(&backward, &self.end_activities);

        let mut disconnected: Vec<&str> = self
            .activities
            .keys()
            .map(String::as_str)
            .filter(|a| !(from_start.contains(a) && to_end.contains(a)))
            .collect();
        disconnected.sort();
        disconnected
    }

    #[cfg(feature = "graphviz-export")]
    /// Write a PNG rendering of this graph to `path`
    ///
    /// Only available with the `graphviz-export` feature.
    pub fn export_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), std::io::Error> {
        super::image_export::export_dfg_image_png(self, path)
    }

    #[cfg(feature = "graphviz-export")]
    /// Write an SVG rendering of this graph to `path`
    ///
    /// Only available with the `graphviz-export` feature.
    pub fn export_svg<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), std::io::Error> {
        super::image_export::export_dfg_image_svg(self, path)
    }
}

/// All nodes of `graph` reachable from one of the `roots` (roots outside of the graph are skipped)
fn reachable_from<'g>(graph: &DiGraphMap<&'g str, ()>, roots: &HashSet<Activity>) -> HashSet<&'g str> {
    let mut visited = HashSet::new();
    for root in roots {
        let Some(root) = graph.nodes().find(|n| *n == root.as_str()) else {
            continue;
        };
        let mut dfs = Dfs::new(graph, root);
        while let Some(n) = dfs.next(graph) {
            visited.insert(n);
        }
    }
    visited
}
