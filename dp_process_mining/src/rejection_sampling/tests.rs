use super::{
    config::DphmConfig,
    session::{DphmSession, SamplingState},
};
use crate::{
    discovery::{
        dfg_discovery::DfgDiscovery,
        engine::{ConstructionError, DiscoveryEngine, DiscoveryInput},
    },
    evaluation::{
        dfg_evaluator::DfgEvaluator,
        metrics::{EvaluationError, ModelEvaluator, QualityMetric, RejectionMetric},
    },
    event_log::{
        activity_projection::EventLogActivityProjection,
        import_log::{import_log_path, LogImportError},
        EventLog,
    },
    privacy::{
        budget::PrivacyQuery,
        trace_statistics::{END_ACTIVITY, START_ACTIVITY},
    },
    utils::test_utils::get_test_data_path,
};

#[derive(Debug)]
struct FailingEngine;

impl DiscoveryEngine for FailingEngine {
    type Model = ();

    fn discover(&self, _input: DiscoveryInput<'_>) -> Result<(), ConstructionError> {
        Err(ConstructionError::NoStartActivities)
    }
}

#[derive(Debug)]
struct UnitEngine;

impl DiscoveryEngine for UnitEngine {
    type Model = ();

    fn discover(&self, _input: DiscoveryInput<'_>) -> Result<(), ConstructionError> {
        Ok(())
    }
}

#[derive(Debug)]
struct ConstantEvaluator(Result<f64, EvaluationError>);

impl ModelEvaluator<()> for ConstantEvaluator {
    fn evaluate(
        &self,
        _log: &EventLogActivityProjection,
        _model: &(),
        _metric: QualityMetric,
    ) -> Result<f64, EvaluationError> {
        self.0.clone()
    }
}

fn abc_log() -> EventLog {
    EventLog::from_activity_sequences(vec![vec!["A", "B", "C"], vec!["A", "C"]])
}

fn seeded(seed: u64) -> DphmConfig {
    DphmConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn end_to_end_abc() {
    let mut session = DphmSession::new(DfgDiscovery, DfgEvaluator, seeded(1));
    assert_eq!(session.state(), SamplingState::Idle);
    let outcome = session.load_log(&abc_log()).unwrap();

    let matrix = session.matrix().unwrap();
    assert_eq!(matrix.len(), 15);
    assert_eq!(matrix.get_by_label(START_ACTIVITY, "A"), 2);
    assert_eq!(matrix.get_by_label("A", "B"), 1);
    assert_eq!(matrix.get_by_label("B", "C"), 1);
    assert_eq!(matrix.get_by_label("A", "C"), 1);
    assert_eq!(matrix.get_by_label("C", END_ACTIVITY), 2);
    assert_eq!(matrix.get_by_label("B", END_ACTIVITY), 0);
    assert_eq!(matrix.iter().map(|(_, c)| c).sum::<u64>(), 7);

    assert!(outcome.state.is_terminal());
    assert_eq!(session.state(), outcome.state);
    assert!(outcome.rounds >= 1);
    assert!(outcome.rounds <= session.sampling_budget().max_rounds);
    match session.accepted() {
        Some(accepted) => {
            assert_eq!(outcome.state, SamplingState::Accepted);
            assert_eq!(accepted.round(), outcome.rounds);
            assert!(accepted
                .model()
                .activities
                .keys()
                .all(|a| ["A", "B", "C"].contains(&a.as_str())));
        }
        None => assert_ne!(outcome.state, SamplingState::Accepted),
    }
}

#[test]
fn seeded_sessions_are_reproducible() {
    let log = EventLog::from_activity_sequences(vec![
        vec!["A", "B", "C", "D"],
        vec!["A", "C", "B", "D"],
        vec!["A", "E", "D"],
        vec!["A", "B", "C", "E", "D"],
        vec!["F", "C", "D"],
        vec!["A", "B", "B", "C", "D"],
        vec!["A", "F", "E"],
    ]);
    let run = |seed, metric| {
        let config = DphmConfig {
            seed: Some(seed),
            epsilon: 50.0,
            rejection_metric: metric,
            ..Default::default()
        };
        let mut session = DphmSession::new(DfgDiscovery, DfgEvaluator, config);
        let first = session.load_log(&log).unwrap();
        let second = session.resample(true);
        (
            first,
            second,
            session.statistics().cloned(),
            session.ledger().entries().to_vec(),
            session.accepted().map(|a| a.noised_score().to_bits()),
        )
    };
    for metric in RejectionMetric::ALL {
        for seed in [3, 17, 2024] {
            let expected = run(seed, metric);
            for _ in 0..20 {
                assert_eq!(run(seed, metric), expected, "{metric} with seed {seed}");
            }
        }
    }
}

#[test]
fn sampling_terminates_within_budget() {
    let runs = 500;
    let mut exhausted = 0;
    for seed in 0..runs {
        let config = DphmConfig {
            gamma: 0.1,
            failure_probability: 0.01,
            seed: Some(seed),
            ..Default::default()
        };
        let mut session =
            DphmSession::new(FailingEngine, ConstantEvaluator(Ok(1.0)), config);
        let max_rounds = session.sampling_budget().max_rounds;
        assert_eq!(max_rounds, 53);
        let outcome = session.load_log(&abc_log()).unwrap();
        assert!(outcome.rounds <= max_rounds);
        match outcome.state {
            SamplingState::Exhausted => {
                assert_eq!(outcome.rounds, max_rounds);
                exhausted += 1;
            }
            SamplingState::Aborted => {}
            other => panic!("Unexpected state {other:?}"),
        }
        assert!(session.accepted().is_none());
    }
    // (1 - 0.1)^53 ≈ 0.004 <= 0.01
    assert!(exhausted as f64 / runs as f64 <= 2.0 * 0.01, "{exhausted} runs exhausted");
}

#[test]
fn failing_rounds_are_not_fatal() {
    let config = DphmConfig {
        gamma: 0.05,
        seed: Some(8),
        ..Default::default()
    };
    let mut session = DphmSession::new(
        UnitEngine,
        ConstantEvaluator(Err(EvaluationError::EmptyLog)),
        config.clone(),
    );
    let outcome = session.load_log(&abc_log()).unwrap();
    assert!(matches!(
        outcome.state,
        SamplingState::Exhausted | SamplingState::Aborted
    ));
    assert!(session.accepted().is_none());
    // statistics were released, but no score
    assert_eq!(session.ledger().spent_on(PrivacyQuery::QualityScore), 0.0);

    let mut session = DphmSession::new(FailingEngine, ConstantEvaluator(Ok(1.0)), config);
    let outcome = session.load_log(&abc_log()).unwrap();
    assert!(outcome.state.is_terminal());
    assert_ne!(outcome.state, SamplingState::Accepted);
}

#[test]
fn recheck_reuses_statistics() {
    let config = DphmConfig {
        gamma: 1e-9,
        rejection_threshold: 0.0,
        seed: Some(5),
        ..Default::default()
    };
    let mut session = DphmSession::new(UnitEngine, ConstantEvaluator(Ok(1.0)), config.clone());
    let outcome = session.load_log(&abc_log()).unwrap();
    assert_eq!(outcome.state, SamplingState::Accepted);
    let statistics = session.statistics().cloned();
    assert!(statistics.is_some());
    let edge_releases = session.ledger().spent_on(PrivacyQuery::EdgeCounts);
    let score_releases = session.ledger().spent_on(PrivacyQuery::QualityScore);

    let outcome = session.update_config(DphmConfig {
        rejection_threshold: 0.5,
        rejection_metric: RejectionMetric::F1,
        ..config.clone()
    });
    assert!(outcome.state.is_terminal());
    assert_eq!(session.statistics().cloned(), statistics);
    assert_eq!(session.ledger().spent_on(PrivacyQuery::EdgeCounts), edge_releases);
    // every re-check draws and charges a fresh score
    assert!(session.ledger().spent_on(PrivacyQuery::QualityScore) > score_releases);

    session.recheck();
    assert_eq!(session.statistics().cloned(), statistics);

    // a new budget requires fresh statistics
    session.update_config(DphmConfig {
        epsilon: 1.0,
        ..config
    });
    assert!(session.ledger().spent_on(PrivacyQuery::EdgeCounts) > edge_releases);
}

#[test]
fn sampling_parameters_are_fixed_per_session() {
    let mut session = DphmSession::new(UnitEngine, ConstantEvaluator(Ok(1.0)), seeded(9));
    session.update_config(DphmConfig {
        gamma: 0.5,
        failure_probability: 0.5,
        seed: Some(10),
        ..seeded(9)
    });
    assert_eq!(session.config().gamma, DphmConfig::default().gamma);
    assert_eq!(session.config().seed, Some(9));
    assert_eq!(session.sampling_budget().max_rounds, 530);
    // no log yet: nothing to sample
    assert_eq!(session.state(), SamplingState::Idle);
}

#[test]
fn invalid_budget_never_accepts() {
    let mut session = DphmSession::new(
        DfgDiscovery,
        DfgEvaluator,
        DphmConfig {
            epsilon: 0.0,
            gamma: 0.2,
            seed: Some(4),
            ..Default::default()
        },
    );
    let outcome = session.load_log(&abc_log()).unwrap();
    assert_ne!(outcome.state, SamplingState::Accepted);
    assert!(session.statistics().map_or(true, |s| s.is_empty()));
    assert!(session.ledger().entries().is_empty());
}

#[test]
fn failed_load_keeps_session() {
    let mut session = DphmSession::new(DfgDiscovery, DfgEvaluator, seeded(6));
    let empty = EventLog::from_activity_sequences(vec![Vec::<&str>::new()]);
    assert!(matches!(
        session.load_log(&empty),
        Err(LogImportError::NoActivities)
    ));
    assert_eq!(session.state(), SamplingState::Idle);
    assert!(session.activities().is_none());

    session.load_log(&abc_log()).unwrap();
    let state = session.state();
    let ledger_len = session.ledger().entries().len();
    assert!(session.load_log(&EventLog::default()).is_err());
    assert_eq!(session.state(), state);
    assert_eq!(session.activities().unwrap(), ["A", "B", "C"]);
    assert_eq!(session.ledger().entries().len(), ledger_len);
}

#[test]
fn running_example_from_file() {
    let log = import_log_path(get_test_data_path().join("running-example.json")).unwrap();
    let mut session = DphmSession::new(
        DfgDiscovery,
        DfgEvaluator,
        DphmConfig {
            epsilon: 2.0,
            rejection_metric: RejectionMetric::F1,
            rejection_threshold: 0.3,
            seed: Some(12),
            ..Default::default()
        },
    );
    let outcome = session.load_log(&log).unwrap();
    assert!(outcome.state.is_terminal());
    assert!(outcome.rounds <= session.sampling_budget().max_rounds);
    let loss = session.ledger().total_spent();
    assert!(loss > 0.0 || outcome.rounds == 1);
    // each round releases statistics (1.4ε) and at most one score (0.1ε)
    assert!(loss <= outcome.rounds as f64 * 1.5 * 2.0 + 1e-9);
}
