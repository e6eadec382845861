use std::{fs, path::PathBuf, time::Instant};

use anyhow::{bail, Context, Result};
use dp_process_mining::{
    dfg::image_export::export_dfg_to_dot_string, import_log_path, DfgDiscovery, DfgEvaluator,
    DphmConfig, DphmSession, SamplingState,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: binary <event log (.json/.csv[.gz])> [config.json] [output prefix]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(log_path) = args.first() else {
        bail!(USAGE);
    };
    let config = match args.get(1) {
        Some(path) => DphmConfig::from_json(
            &fs::read_to_string(path).with_context(|| format!("Reading config {path}"))?,
        )
        .with_context(|| format!("Parsing config {path}"))?,
        None => DphmConfig::default(),
    };
    config.validate()?;
    let out_prefix = PathBuf::from(args.get(2).map(String::as_str).unwrap_or("dp_model"));

    let now = Instant::now();
    let log = import_log_path(log_path).with_context(|| format!("Importing {log_path}"))?;
    info!(
        traces = log.traces.len(),
        events = log.num_events(),
        "Imported event log in {:#?}",
        now.elapsed()
    );

    let now = Instant::now();
    let mut session = DphmSession::new(DfgDiscovery, DfgEvaluator, config);
    let outcome = session.load_log(&log)?;
    info!(
        state = ?outcome.state,
        rounds = outcome.rounds,
        max_rounds = session.sampling_budget().max_rounds,
        privacy_loss = session.ledger().total_spent(),
        "Rejection sampling done in {:#?}",
        now.elapsed()
    );

    match (outcome.state, session.accepted()) {
        (SamplingState::Accepted, Some(accepted)) => {
            let json_path = out_prefix.with_extension("json");
            fs::write(&json_path, accepted.model().to_json())?;
            let dot_path = out_prefix.with_extension("dot");
            fs::write(&dot_path, export_dfg_to_dot_string(accepted.model()))?;
            info!(
                metric = %accepted.metric(),
                noised_score = accepted.noised_score(),
                "Wrote accepted model to {} and {}",
                json_path.display(),
                dot_path.display()
            );
        }
        (state, _) => warn!(?state, "No model was accepted, nothing is released"),
    }
    Ok(())
}
