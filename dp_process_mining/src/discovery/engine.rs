use serde::{Deserialize, Serialize};

use crate::privacy::noised_statistics::NoisedStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Sensitivity thresholds passed on to process discovery
pub struct DiscoveryThresholds {
    /// Minimum dependency measure of an arc (in `[-1, 1]`)
    pub dependency: f64,
    /// AND-measure threshold for parallel splits/joins
    pub and_measure: f64,
    /// Minimum (noised) number of occurrences of an activity
    pub min_act_count: u64,
    /// Minimum (noised) number of occurrences of a directly-follows relation
    pub min_dfg_occurrences: u64,
    /// Pre-cleaning threshold, relative to the strongest outgoing relation of an activity
    pub dfg_pre_cleaning_noise: f64,
    /// Threshold for length-two loops
    pub loops_length_two: f64,
}

impl Default for DiscoveryThresholds {
    fn default() -> Self {
        Self {
            dependency: -1.0,
            and_measure: 0.0,
            min_act_count: 1,
            min_dfg_occurrences: 1,
            dfg_pre_cleaning_noise: 0.0,
            loops_length_two: 0.0,
        }
    }
}

///
/// Everything a [`DiscoveryEngine`] is allowed to see
///
/// Only noised statistics and the (public) process domain are handed over; the event log itself
/// never crosses this boundary.
///
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryInput<'a> {
    /// Noised statistics of the current round
    pub statistics: &'a NoisedStatistics,
    /// Activity labels, indexed as in `statistics`
    pub activities: &'a [String],
    /// Discovery thresholds
    pub thresholds: &'a DiscoveryThresholds,
}

///
/// The discovery engine could not build a valid model from a noised sample
///
/// Construction failures are expected for unlucky noise draws and never end a sampling session.
///
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// No activity passed the thresholds
    #[error("No activities left after filtering")]
    NoActivities,
    /// No start activity was released (or all were filtered)
    #[error("Model has no start activity")]
    NoStartActivities,
    /// No end activity was released (or all were filtered)
    #[error("Model has no end activity")]
    NoEndActivities,
    /// Some activities are not on any path from a start to an end activity
    #[error("Activities not on a path from start to end: {0:?}")]
    Disconnected(Vec<String>),
    /// Statistics refer to an activity index outside of the process domain
    #[error("Statistics refer to unknown activity index {0}")]
    UnknownActivity(usize),
}

///
/// Process discovery on privacy-preserving statistics
///
pub trait DiscoveryEngine {
    /// Discovered model
    type Model;

    /// Discover a model from one round's noised statistics
    fn discover(&self, input: DiscoveryInput<'_>) -> Result<Self::Model, ConstructionError>;
}
