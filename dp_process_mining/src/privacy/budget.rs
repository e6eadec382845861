use serde::{Deserialize, Serialize};

///
/// The independent sub-queries a privacy budget ε is split across
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrivacyQuery {
    /// Laplace noise on every cell of the directly-follows matrix
    EdgeCounts,
    /// Report Noisy Max selection of start activities
    StartActivitySelection,
    /// Report Noisy Max selection of end activities
    EndActivitySelection,
    /// Report Noisy Max selection of the released edge subset
    EdgeSubsetSelection,
    /// Laplace noise on the quality score used for the acceptance decision
    QualityScore,
}

impl PrivacyQuery {
    /// All sub-queries, in the order they are issued within a round
    pub const ALL: [PrivacyQuery; 5] = [
        PrivacyQuery::EdgeCounts,
        PrivacyQuery::StartActivitySelection,
        PrivacyQuery::EndActivitySelection,
        PrivacyQuery::EdgeSubsetSelection,
        PrivacyQuery::QualityScore,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
///
/// Fixed fractions of the global budget ε assigned to each [`PrivacyQuery`]
///
/// The budget of a query is `fraction · ε`; splits are deterministic and never depend on data.
///
pub struct BudgetAllocation {
    /// Fraction for [`PrivacyQuery::EdgeCounts`]
    pub edge_counts: f64,
    /// Fraction for [`PrivacyQuery::StartActivitySelection`]
    pub start_activity_selection: f64,
    /// Fraction for [`PrivacyQuery::EndActivitySelection`]
    pub end_activity_selection: f64,
    /// Fraction for [`PrivacyQuery::EdgeSubsetSelection`]
    pub edge_subset_selection: f64,
    /// Fraction for [`PrivacyQuery::QualityScore`]
    pub quality_score: f64,
}

impl Default for BudgetAllocation {
    fn default() -> Self {
        Self {
            edge_counts: 0.65,
            start_activity_selection: 0.25,
            end_activity_selection: 0.25,
            edge_subset_selection: 0.25,
            quality_score: 0.1,
        }
    }
}

impl BudgetAllocation {
    /// Fraction of ε assigned to `query`
    pub fn fraction(&self, query: PrivacyQuery) -> f64 {
        match query {
            PrivacyQuery::EdgeCounts => self.edge_counts,
            PrivacyQuery::StartActivitySelection => self.start_activity_selection,
            PrivacyQuery::EndActivitySelection => self.end_activity_selection,
            PrivacyQuery::EdgeSubsetSelection => self.edge_subset_selection,
            PrivacyQuery::QualityScore => self.quality_score,
        }
    }

    /// Budget of `query` for the global budget `epsilon`
    pub fn budget(&self, query: PrivacyQuery, epsilon: f64) -> f64 {
        self.fraction(query) * epsilon
    }

    /// Sum of all fractions, i.e., the multiple of ε one full round (statistics and one quality
    /// check) consumes under sequential composition
    pub fn total_fraction(&self) -> f64 {
        PrivacyQuery::ALL.iter().map(|q| self.fraction(*q)).sum()
    }

    /// Rescale all fractions proportionally so they sum to at most 1
    ///
    /// Allocations that already sum to at most 1 are returned unchanged.
    pub fn normalized(&self) -> Self {
        let total = self.total_fraction();
        if total <= 1.0 || !total.is_finite() {
            return *self;
        }
        Self {
            edge_counts: self.edge_counts / total,
            start_activity_selection: self.start_activity_selection / total,
            end_activity_selection: self.end_activity_selection / total,
            edge_subset_selection: self.edge_subset_selection / total,
            quality_score: self.quality_score / total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// One released query together with the budget it consumed
pub struct LedgerEntry {
    /// Sampling round the query was issued in (starting at 1 within a session)
    pub round: usize,
    /// Kind of query
    pub query: PrivacyQuery,
    /// Budget spent
    pub epsilon: f64,
}

///
/// Record of every privacy-relevant release of a session
///
/// Sequential composition: the cumulative privacy loss is the sum of all recorded budgets.
///
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacyLedger {
    entries: Vec<LedgerEntry>,
}

impl PrivacyLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a release; non-positive budgets mean nothing was released and are not recorded
    pub fn charge(&mut self, round: usize, query: PrivacyQuery, epsilon: f64) {
        if epsilon > 0.0 && epsilon.is_finite() {
            self.entries.push(LedgerEntry {
                round,
                query,
                epsilon,
            });
        }
    }

    /// All recorded releases, in order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Cumulative privacy loss
    pub fn total_spent(&self) -> f64 {
        self.entries.iter().map(|e| e.epsilon).sum()
    }

    /// Cumulative privacy loss of one kind of query
    pub fn spent_on(&self, query: PrivacyQuery) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.query == query)
            .map(|e| e.epsilon)
            .sum()
    }

    /// Forget all entries (a new log starts a new accounting)
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

///
/// Upper bound on the number of rejection-sampling rounds
///
/// Computed from the per-round abort probability γ and the target failure probability ε₀ as
/// `max(⌈(1/γ)·ln(2/ε₀)⌉, ⌈1/(e·γ)⌉)`.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingBudget {
    /// Per-round abort probability γ
    pub gamma: f64,
    /// Target failure probability ε₀
    pub failure_probability: f64,
    /// Maximum number of rounds
    pub max_rounds: usize,
}

impl SamplingBudget {
    /// Compute the sampling budget
    ///
    /// Out-of-range parameters do not panic: γ is clamped to `(0, 1]` and ε₀ to `(0, 2)`; non-finite
    /// values fall back to the defaults.
    pub fn new(gamma: f64, failure_probability: f64) -> Self {
        let gamma = if gamma.is_finite() {
            gamma.clamp(f64::MIN_POSITIVE, 1.0)
        } else {
            DEFAULT_GAMMA
        };
        let failure_probability = if failure_probability.is_finite() {
            failure_probability.clamp(f64::MIN_POSITIVE, 2.0 - f64::EPSILON)
        } else {
            DEFAULT_FAILURE_PROBABILITY
        };
        let tail = ((1.0 / gamma) * (2.0 / failure_probability).ln()).ceil();
        let geometric = (1.0 / (std::f64::consts::E * gamma)).ceil();
        let max_rounds = tail.max(geometric).min(MAX_ROUNDS as f64).max(1.0) as usize;
        Self {
            gamma,
            failure_probability,
            max_rounds,
        }
    }
}

impl Default for SamplingBudget {
    fn default() -> Self {
        Self::new(DEFAULT_GAMMA, DEFAULT_FAILURE_PROBABILITY)
    }
}

/// Default per-round abort probability γ
pub const DEFAULT_GAMMA: f64 = 0.01;
/// Default target failure probability ε₀
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.01;
/// Hard cap on rounds for degenerate (tiny) γ
const MAX_ROUNDS: usize = 1_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allocation() {
        let alloc = BudgetAllocation::default();
        assert!((alloc.budget(PrivacyQuery::EdgeCounts, 5.0) - 3.25).abs() < 1e-12);
        assert!((alloc.budget(PrivacyQuery::QualityScore, 5.0) - 0.5).abs() < 1e-12);
        assert!((alloc.total_fraction() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn normalized_allocation_stays_within_budget() {
        let alloc = BudgetAllocation::default().normalized();
        assert!((alloc.total_fraction() - 1.0).abs() < 1e-12);
        assert!(
            (alloc.edge_counts / alloc.quality_score - 6.5).abs() < 1e-9,
            "proportions are kept"
        );
        let small = BudgetAllocation {
            edge_counts: 0.5,
            ..BudgetAllocation::default()
        };
        let small = BudgetAllocation {
            start_activity_selection: 0.1,
            end_activity_selection: 0.1,
            edge_subset_selection: 0.1,
            ..small
        };
        assert_eq!(small.normalized(), small);
    }

    #[test]
    fn ledger_accumulates() {
        let mut ledger = PrivacyLedger::new();
        ledger.charge(1, PrivacyQuery::EdgeCounts, 0.65);
        ledger.charge(1, PrivacyQuery::QualityScore, 0.1);
        ledger.charge(2, PrivacyQuery::QualityScore, 0.1);
        ledger.charge(2, PrivacyQuery::QualityScore, 0.0);
        assert_eq!(ledger.entries().len(), 3);
        assert!((ledger.total_spent() - 0.85).abs() < 1e-12);
        assert!((ledger.spent_on(PrivacyQuery::QualityScore) - 0.2).abs() < 1e-12);
        ledger.clear();
        assert_eq!(ledger.total_spent(), 0.0);
    }

    #[test]
    fn sampling_budget_defaults() {
        // 100 * ln(200) = 529.8...
        assert_eq!(SamplingBudget::default().max_rounds, 530);
        // 10 * ln(200) = 52.98...; 1 / (e * 0.1) = 3.67...
        assert_eq!(SamplingBudget::new(0.1, 0.01).max_rounds, 53);
    }

    #[test]
    fn sampling_budget_geometric_term() {
        // ln(2 / 1.9) is tiny, so the 1/(e·γ) term dominates: 1 / (e * 0.01) = 36.78...
        assert_eq!(SamplingBudget::new(0.01, 1.9).max_rounds, 37);
    }

    #[test]
    fn sampling_budget_degenerate_parameters() {
        assert_eq!(SamplingBudget::new(1.0, 1.0).max_rounds, 1);
        assert!(SamplingBudget::new(0.0, 0.01).max_rounds >= 1);
        assert_eq!(
            SamplingBudget::new(f64::NAN, f64::INFINITY),
            SamplingBudget::default()
        );
        assert!(SamplingBudget::new(-3.0, -1.0).max_rounds >= 1);
    }
}
