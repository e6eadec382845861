use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::DphmConfig;
use crate::{
    discovery::engine::{DiscoveryEngine, DiscoveryInput},
    evaluation::metrics::{ModelEvaluator, RejectionMetric},
    event_log::{
        activity_projection::EventLogActivityProjection, import_log::LogImportError, EventLog,
    },
    privacy::{
        budget::{PrivacyLedger, PrivacyQuery, SamplingBudget},
        df_matrix::DirectlyFollowsMatrix,
        mechanisms::LaplaceMechanism,
        noised_statistics::{assemble_noised_statistics, NoisedStatistics},
    },
};

/// Sensitivity of quality scores in `[0, 1]`
const SCORE_SENSITIVITY: f64 = 1.0;

/// State of a [`DphmSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingState {
    /// No log loaded yet
    Idle,
    /// Rejection sampling in progress
    Sampling,
    /// A candidate passed the (noised) quality check and was published
    Accepted,
    /// All rounds of the sampling budget were used without acceptance
    Exhausted,
    /// The random early abort was drawn
    Aborted,
}

impl SamplingState {
    /// Whether sampling has ended in this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SamplingState::Accepted | SamplingState::Exhausted | SamplingState::Aborted
        )
    }
}

/// Result of one sampling invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingOutcome {
    /// State the invocation ended in
    pub state: SamplingState,
    /// Number of rounds started (including an aborting round)
    pub rounds: usize,
}

///
/// A model that passed the noised quality check
///
/// Only a [`DphmSession`] can create accepted candidates, so holding one means the model was
/// released through the privacy-preserving pipeline.
///
#[derive(Debug, Clone)]
pub struct AcceptedCandidate<M> {
    model: M,
    noised_score: f64,
    metric: RejectionMetric,
    round: usize,
}

impl<M> AcceptedCandidate<M> {
    /// The accepted model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Noised score the acceptance was based on
    pub fn noised_score(&self) -> f64 {
        self.noised_score
    }

    /// Metric of the acceptance check
    pub fn metric(&self) -> RejectionMetric {
        self.metric
    }

    /// Round (within its sampling invocation) the candidate was accepted in
    pub fn round(&self) -> usize {
        self.round
    }

    /// Take the accepted model
    pub fn into_model(self) -> M {
        self.model
    }
}

/// Log state, fixed until the next log is loaded
#[derive(Debug)]
struct LoadedLog {
    projection: EventLogActivityProjection,
    matrix: DirectlyFollowsMatrix,
}

///
/// Budgeted rejection sampling of differentially private process models
///
/// The session owns all state of one sampling workflow: the loaded log and its
/// [`DirectlyFollowsMatrix`], the current [`NoisedStatistics`], the accepted candidate, the
/// [`PrivacyLedger`], and the single random source all noise, coin flips and subset sizes are drawn
/// from. Discovery and evaluation are delegated to `E` and `V`; `E` only ever sees noised statistics.
///
/// Each invocation ([`DphmSession::load_log`], [`DphmSession::resample`],
/// [`DphmSession::recheck`], [`DphmSession::update_config`]) runs to completion and supersedes the
/// previous result.
///
#[derive(Debug)]
pub struct DphmSession<E: DiscoveryEngine, V> {
    engine: E,
    evaluator: V,
    config: DphmConfig,
    sampling_budget: SamplingBudget,
    log: Option<LoadedLog>,
    statistics: Option<NoisedStatistics>,
    accepted: Option<AcceptedCandidate<E::Model>>,
    ledger: PrivacyLedger,
    rng: StdRng,
    state: SamplingState,
    issued_rounds: usize,
}

impl<E, V> DphmSession<E, V>
where
    E: DiscoveryEngine,
    V: ModelEvaluator<E::Model>,
{
    /// Create an idle session
    ///
    /// The sampling budget is computed once from the configured γ and ε₀.
    pub fn new(engine: E, evaluator: V, config: DphmConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let sampling_budget = config.sampling_budget();
        debug!(max_rounds = sampling_budget.max_rounds, "Created sampling session");
        Self {
            engine,
            evaluator,
            config,
            sampling_budget,
            log: None,
            statistics: None,
            accepted: None,
            ledger: PrivacyLedger::new(),
            rng,
            state: SamplingState::Idle,
            issued_rounds: 0,
        }
    }

    /// Load an event log and sample with fresh noise
    ///
    /// On error, the session is left unchanged.
    pub fn load_log(&mut self, log: &EventLog) -> Result<SamplingOutcome, LogImportError> {
        self.load_projection(EventLogActivityProjection::from(log))
    }

    /// Load an already projected event log and sample with fresh noise
    ///
    /// The directly-follows matrix is built once here; all previous statistics, candidates and
    /// ledger entries are discarded. On error, the session is left unchanged.
    pub fn load_projection(
        &mut self,
        projection: EventLogActivityProjection,
    ) -> Result<SamplingOutcome, LogImportError> {
        if projection.activities.is_empty() {
            return Err(LogImportError::NoActivities);
        }
        let matrix = DirectlyFollowsMatrix::from_log(&projection);
        info!(
            traces = projection.num_traces(),
            activities = projection.activities.len(),
            "Loaded event log"
        );
        self.log = Some(LoadedLog { projection, matrix });
        self.statistics = None;
        self.accepted = None;
        self.ledger.clear();
        self.issued_rounds = 0;
        Ok(self.sample(true))
    }

    /// Run rejection sampling again
    ///
    /// With `regenerate`, every round draws fresh noised statistics; otherwise the statistics of
    /// the previous invocation are reused (fresh ones are drawn only if there are none yet).
    /// Without a loaded log, nothing happens.
    pub fn resample(&mut self, regenerate: bool) -> SamplingOutcome {
        if self.log.is_none() {
            return SamplingOutcome {
                state: self.state,
                rounds: 0,
            };
        }
        self.sample(regenerate)
    }

    /// Re-check acceptance on the current noised statistics, e.g., after the rejection
    /// threshold or metric changed
    ///
    /// No new statistics are released; each round still draws (and charges) a fresh noised
    /// quality score.
    pub fn recheck(&mut self) -> SamplingOutcome {
        self.resample(false)
    }

    /// Replace the configuration and sample again
    ///
    /// Fresh statistics are only drawn if ε or the budget allocation changed. γ, ε₀ and the seed
    /// are fixed for the lifetime of a session; changes to them are ignored.
    pub fn update_config(&mut self, mut config: DphmConfig) -> SamplingOutcome {
        if config.gamma.to_bits() != self.config.gamma.to_bits()
            || config.failure_probability.to_bits() != self.config.failure_probability.to_bits()
        {
            warn!("Abort and failure probability are fixed per session, ignoring new values");
            config.gamma = self.config.gamma;
            config.failure_probability = self.config.failure_probability;
        }
        if config.seed != self.config.seed {
            warn!("Random seed is fixed per session, ignoring new value");
            config.seed = self.config.seed;
        }
        let regenerate = self.config.requires_new_statistics(&config);
        self.config = config;
        self.resample(regenerate)
    }

    fn sample(&mut self, regenerate: bool) -> SamplingOutcome {
        let Some(log) = &self.log else {
            return SamplingOutcome {
                state: self.state,
                rounds: 0,
            };
        };
        self.state = SamplingState::Sampling;
        self.accepted = None;
        let epsilon = self.config.epsilon;
        let allocation = self.config.allocation;
        let score_mech = LaplaceMechanism::new(
            SCORE_SENSITIVITY,
            allocation.budget(PrivacyQuery::QualityScore, epsilon),
        );

        for round in 1..=self.sampling_budget.max_rounds {
            self.issued_rounds += 1;
            let ledger_round = self.issued_rounds;

            if self.rng.random::<f64>() <= self.sampling_budget.gamma {
                return self.finish(SamplingState::Aborted, round);
            }

            if regenerate || self.statistics.is_none() {
                self.statistics = Some(assemble_noised_statistics(
                    &log.matrix,
                    epsilon,
                    &allocation,
                    &mut self.rng,
                    &mut self.ledger,
                    ledger_round,
                ));
            }
            let Some(statistics) = &self.statistics else {
                continue;
            };

            let model = match self.engine.discover(DiscoveryInput {
                statistics,
                activities: log.matrix.activities(),
                thresholds: &self.config.thresholds,
            }) {
                Ok(model) => model,
                Err(e) => {
                    debug!(round, error = %e, "No candidate in this round");
                    continue;
                }
            };

            let metric = self.config.rejection_metric;
            let score = match metric.score(&self.evaluator, &log.projection, &model) {
                Ok(score) => score,
                Err(e) => {
                    debug!(round, error = %e, "Candidate could not be evaluated");
                    continue;
                }
            };
            let Some(score_mech) = &score_mech else {
                debug!(round, "No budget for the quality score, rejecting");
                continue;
            };
            let noised_score = score_mech.add_noise(score, &mut self.rng);
            self.ledger
                .charge(ledger_round, PrivacyQuery::QualityScore, score_mech.epsilon());

            if noised_score >= self.config.rejection_threshold {
                debug!(round, noised_score, "Candidate accepted");
                self.accepted = Some(AcceptedCandidate {
                    model,
                    noised_score,
                    metric,
                    round,
                });
                return self.finish(SamplingState::Accepted, round);
            }
            debug!(round, noised_score, "Candidate rejected");
        }
        self.finish(SamplingState::Exhausted, self.sampling_budget.max_rounds)
    }

    fn finish(&mut self, state: SamplingState, rounds: usize) -> SamplingOutcome {
        self.state = state;
        info!(
            ?state,
            rounds,
            privacy_loss = self.ledger.total_spent(),
            "Rejection sampling finished"
        );
        SamplingOutcome { state, rounds }
    }

    /// Current state
    pub fn state(&self) -> SamplingState {
        self.state
    }

    /// The accepted candidate of the last invocation, if any
    pub fn accepted(&self) -> Option<&AcceptedCandidate<E::Model>> {
        self.accepted.as_ref()
    }

    /// Noised statistics of the most recent round that drew some
    pub fn statistics(&self) -> Option<&NoisedStatistics> {
        self.statistics.as_ref()
    }

    /// Every privacy-relevant release since the current log was loaded
    pub fn ledger(&self) -> &PrivacyLedger {
        &self.ledger
    }

    /// Current configuration
    pub fn config(&self) -> &DphmConfig {
        &self.config
    }

    /// Maximum number of rounds per invocation
    pub fn sampling_budget(&self) -> &SamplingBudget {
        &self.sampling_budget
    }

    /// Process domain of the loaded log
    pub fn activities(&self) -> Option<&[String]> {
        self.log.as_ref().map(|l| l.matrix.activities())
    }

    /// Exact directly-follows matrix of the loaded log
    ///
    /// _Note_: This is not privacy-preserving and must not be released.
    pub fn matrix(&self) -> Option<&DirectlyFollowsMatrix> {
        self.log.as_ref().map(|l| &l.matrix)
    }
}
