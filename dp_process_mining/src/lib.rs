#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]

#![doc = include_str!("../README.md")]

///
/// Event Logs (case-centric [`EventLog`] and its activity projection)
///
pub mod event_log {
    /// Activity projection of event logs
    pub mod activity_projection;
    /// [`EventLog`] struct and sub-structs
    pub mod event_log_struct;
    /// JSON and CSV Import
    pub mod import_log;

    pub use event_log_struct::{Event, EventLog, Trace};
}

///
/// Differential privacy core: directly-follows statistics, privacy mechanisms and budgets
///
pub mod privacy {
    /// Privacy budget allocation, ledger and sampling budget
    pub mod budget;
    /// Directly-follows matrix over the full activity space
    pub mod df_matrix;
    /// Laplace mechanism, Report Noisy Max and subset-size selection
    pub mod mechanisms;
    /// Assembling the noised statistics handed to process discovery
    pub mod noised_statistics;
    /// Sensitivity-bounded directly-follows pairs per trace
    pub mod trace_statistics;

    #[doc(inline)]
    pub use df_matrix::DirectlyFollowsMatrix;
    #[doc(inline)]
    pub use noised_statistics::NoisedStatistics;
}

///
/// Directly-follows graph
///
pub mod dfg {
    /// [`DirectlyFollowsGraph`] struct
    pub mod dfg_struct;
    #[cfg(feature = "graphviz-export")]
    /// Export [`DirectlyFollowsGraph`] to images (SVG, PNG, ...)
    ///
    /// __Requires the `graphviz-export` feature to be enabled__
    ///
    /// Also requires an active graphviz installation in the PATH.
    /// See also <https://github.com/besok/graphviz-rust?tab=readme-ov-file#caveats> and <https://graphviz.org/download/>
    pub mod image_export;

    #[doc(inline)]
    pub use crate::dfg::dfg_struct::DirectlyFollowsGraph;
}

///
/// Process discovery boundary
///
pub mod discovery {
    /// [`DiscoveryEngine`](engine::DiscoveryEngine) trait and discovery thresholds
    pub mod engine;
    /// Reference engine constructing a [`DirectlyFollowsGraph`] from noised statistics
    pub mod dfg_discovery;
}

///
/// Model quality evaluation boundary
///
pub mod evaluation {
    /// Quality metrics and the [`ModelEvaluator`](metrics::ModelEvaluator) trait
    pub mod metrics;
    /// Reference evaluator for [`DirectlyFollowsGraph`]s
    pub mod dfg_evaluator;
}

///
/// Budgeted rejection sampling of privacy-preserving process models
///
pub mod rejection_sampling {
    /// Configuration of a sampling session
    pub mod config;
    /// Rejection-sampling controller and its session state
    pub mod session;

    #[cfg(test)]
    mod tests;
}

/// Util module with smaller helper functions, structs or enums
pub mod utils;

#[doc(inline)]
pub use event_log::event_log_struct::EventLog;

#[doc(inline)]
pub use event_log::activity_projection::EventLogActivityProjection;

#[doc(inline)]
pub use event_log::import_log::{import_log_csv_path, import_log_json_path, import_log_path};

#[doc(inline)]
pub use dfg::DirectlyFollowsGraph;

#[doc(inline)]
pub use discovery::dfg_discovery::DfgDiscovery;

#[doc(inline)]
pub use evaluation::dfg_evaluator::DfgEvaluator;

#[doc(inline)]
pub use rejection_sampling::config::DphmConfig;

#[doc(inline)]
pub use rejection_sampling::session::{DphmSession, SamplingOutcome, SamplingState};
