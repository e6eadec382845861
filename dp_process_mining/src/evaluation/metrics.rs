use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::event_log::activity_projection::EventLogActivityProjection;

/// Quality dimension an evaluator computes directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityMetric {
    /// How much of the log the model can replay
    Fitness,
    /// How little behavior the model allows beyond the log
    Precision,
    /// How simple the model structure is
    Simplicity,
    /// How well the model generalizes beyond the observed log
    Generalization,
}

///
/// Metric used for the acceptance decision of rejection sampling
///
/// [`RejectionMetric::F1`] is not computed by evaluators but derived from
/// [`QualityMetric::Fitness`] and [`QualityMetric::Precision`].
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionMetric {
    /// See [`QualityMetric::Fitness`]
    #[default]
    Fitness,
    /// See [`QualityMetric::Precision`]
    Precision,
    /// See [`QualityMetric::Simplicity`]
    Simplicity,
    /// See [`QualityMetric::Generalization`]
    Generalization,
    /// Mean of fitness and precision
    #[serde(rename = "F1-Score")]
    F1,
}

impl RejectionMetric {
    /// All metrics selectable for rejection sampling
    pub const ALL: [RejectionMetric; 5] = [
        RejectionMetric::Fitness,
        RejectionMetric::Precision,
        RejectionMetric::Simplicity,
        RejectionMetric::Generalization,
        RejectionMetric::F1,
    ];

    /// The evaluator metrics this metric is composed of
    pub fn components(&self) -> &'static [QualityMetric] {
        match self {
            RejectionMetric::Fitness => &[QualityMetric::Fitness],
            RejectionMetric::Precision => &[QualityMetric::Precision],
            RejectionMetric::Simplicity => &[QualityMetric::Simplicity],
            RejectionMetric::Generalization => &[QualityMetric::Generalization],
            RejectionMetric::F1 => &[QualityMetric::Fitness, QualityMetric::Precision],
        }
    }

    /// Score `model` with `evaluator`
    ///
    /// Composed metrics are the mean of their components; the first failing component fails the
    /// whole score.
    pub fn score<M, V: ModelEvaluator<M> + ?Sized>(
        &self,
        evaluator: &V,
        log: &EventLogActivityProjection,
        model: &M,
    ) -> Result<f64, EvaluationError> {
        let components = self.components();
        let mut sum = 0.0;
        for metric in components {
            sum += evaluator.evaluate(log, model, *metric)?;
        }
        Ok(sum / components.len() as f64)
    }
}

impl Display for RejectionMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RejectionMetric::Fitness => "Fitness",
            RejectionMetric::Precision => "Precision",
            RejectionMetric::Simplicity => "Simplicity",
            RejectionMetric::Generalization => "Generalization",
            RejectionMetric::F1 => "F1-Score",
        };
        write!(f, "{name}")
    }
}

impl FromStr for RejectionMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fitness" => Ok(RejectionMetric::Fitness),
            "precision" => Ok(RejectionMetric::Precision),
            "simplicity" => Ok(RejectionMetric::Simplicity),
            "generalization" => Ok(RejectionMetric::Generalization),
            "f1" | "f1-score" => Ok(RejectionMetric::F1),
            _ => Err(format!("Unknown rejection metric: {s}")),
        }
    }
}

/// An evaluator could not score a candidate model
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// The log has no traces to evaluate against
    #[error("Cannot evaluate against an empty log")]
    EmptyLog,
    /// The metric is not supported by this evaluator
    #[error("Metric {0:?} is not supported")]
    UnsupportedMetric(QualityMetric),
    /// The computation left the valid numeric domain
    #[error("{metric:?} is not a valid score: {value}")]
    InvalidScore {
        /// Metric that was computed
        metric: QualityMetric,
        /// Offending value
        value: f64,
    },
}

///
/// Scores models of type `M` against the (projected, unnoised) event log
///
/// Scores are expected in `[0, 1]`.
///
pub trait ModelEvaluator<M> {
    /// Evaluate a single metric
    fn evaluate(
        &self,
        log: &EventLogActivityProjection,
        model: &M,
        metric: QualityMetric,
    ) -> Result<f64, EvaluationError>;
}
