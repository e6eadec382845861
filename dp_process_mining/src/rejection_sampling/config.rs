use serde::{Deserialize, Serialize};

use crate::{
    discovery::engine::DiscoveryThresholds,
    evaluation::metrics::RejectionMetric,
    privacy::budget::{
        BudgetAllocation, PrivacyQuery, SamplingBudget, DEFAULT_FAILURE_PROBABILITY,
        DEFAULT_GAMMA,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Parameters of a [`DphmSession`](super::session::DphmSession)
pub struct DphmConfig {
    /// Global privacy budget ε
    pub epsilon: f64,
    /// Thresholds passed on to process discovery
    pub thresholds: DiscoveryThresholds,
    /// Metric used for the acceptance decision
    pub rejection_metric: RejectionMetric,
    /// Minimum (noised) score of an accepted candidate
    pub rejection_threshold: f64,
    /// Per-round abort probability γ
    pub gamma: f64,
    /// Target failure probability ε₀ of the sampling budget
    pub failure_probability: f64,
    /// Split of ε across the sub-queries of a round
    pub allocation: BudgetAllocation,
    /// Seed of the session's random source (`None`: seeded from the OS)
    pub seed: Option<u64>,
}

impl Default for DphmConfig {
    fn default() -> Self {
        Self {
            epsilon: 5.0,
            thresholds: DiscoveryThresholds::default(),
            rejection_metric: RejectionMetric::default(),
            rejection_threshold: 0.0,
            gamma: DEFAULT_GAMMA,
            failure_probability: DEFAULT_FAILURE_PROBABILITY,
            allocation: BudgetAllocation::default(),
            seed: None,
        }
    }
}

/// Out-of-range configuration value
///
/// Sessions accept such configurations anyway and behave degenerately (e.g., release nothing
/// for a non-positive ε); [`DphmConfig::validate`] lets callers reject them upfront.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// ε must be positive and finite
    #[error("Privacy budget must be positive, got {0}")]
    InvalidEpsilon(f64),
    /// The rejection threshold must lie in `[0, 1]`
    #[error("Rejection threshold must be in [0, 1], got {0}")]
    InvalidRejectionThreshold(f64),
    /// γ must lie in `(0, 1]`
    #[error("Abort probability must be in (0, 1], got {0}")]
    InvalidGamma(f64),
    /// ε₀ must lie in `(0, 2)`
    #[error("Failure probability must be in (0, 2), got {0}")]
    InvalidFailureProbability(f64),
    /// Budget fractions must be non-negative and finite
    #[error("Budget fraction for {0:?} must be non-negative, got {1}")]
    InvalidAllocation(PrivacyQuery, f64),
    /// The dependency threshold must lie in `[-1, 1]`
    #[error("Dependency threshold must be in [-1, 1], got {0}")]
    InvalidDependencyThreshold(f64),
}

impl DphmConfig {
    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    /// Deserialize from JSON string (missing fields take their default values)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sampling budget following from γ and ε₀
    pub fn sampling_budget(&self) -> SamplingBudget {
        SamplingBudget::new(self.gamma, self.failure_probability)
    }

    /// Check that all values are in their valid range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(ConfigError::InvalidEpsilon(self.epsilon));
        }
        if !(0.0..=1.0).contains(&self.rejection_threshold) {
            return Err(ConfigError::InvalidRejectionThreshold(
                self.rejection_threshold,
            ));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(ConfigError::InvalidGamma(self.gamma));
        }
        if !(self.failure_probability > 0.0 && self.failure_probability < 2.0) {
            return Err(ConfigError::InvalidFailureProbability(
                self.failure_probability,
            ));
        }
        for query in PrivacyQuery::ALL {
            let fraction = self.allocation.fraction(query);
            if !(fraction >= 0.0 && fraction.is_finite()) {
                return Err(ConfigError::InvalidAllocation(query, fraction));
            }
        }
        if !(-1.0..=1.0).contains(&self.thresholds.dependency) {
            return Err(ConfigError::InvalidDependencyThreshold(
                self.thresholds.dependency,
            ));
        }
        Ok(())
    }

    /// Whether switching from `self` to `other` requires fresh noised statistics
    pub(crate) fn requires_new_statistics(&self, other: &DphmConfig) -> bool {
        self.epsilon.to_bits() != other.epsilon.to_bits() || self.allocation != other.allocation
    }
}
