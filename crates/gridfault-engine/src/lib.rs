//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
pub mod api;
pub mod builder;
pub mod diagnostics;
pub mod errors;
pub mod fault;
pub mod ident;
pub mod io;
pub mod material;
pub mod model;
pub mod reports;
pub mod solver;
pub mod substation;

use std::path::Path;

use gridfault_common::config::EngineConfig;
use tracing::info;

pub use builder::{build_network, BuildOutcome, NetworkBuilder};
pub use diagnostics::{BuildDiagnostic, BuildIssue, Diagnostics, ElementKind, ErrorClass, Outcome};
pub use errors::{EngineError, Result, SimulationError};
pub use fault::{FaultEvaluator, FaultLocator, FaultReport, FaultTarget};
pub use model::{Dataset, Network, NetworkSummary};
pub use reports::ReportExporter;
pub use solver::{FaultKind, SequenceNetworkSolver, ShortCircuitSolver};

/// Loads a dataset (CSV directory or JSON/YAML document) and builds the network.
pub fn build_from_path(path: &Path, config: &EngineConfig) -> Result<BuildOutcome> {
    info!(input = %path.display(), "Loading network dataset...");
    let dataset = io::load_dataset(path)?;

    info!("Building network graph...");
    let outcome = build_network(&dataset, &config.network);
    info!(
        summary = ?outcome.network.summary(),
        diagnostics = outcome.diagnostics.len(),
        "Network ready"
    );
    Ok(outcome)
}

/// Builds the network, evaluates one fault and writes every report to `output_dir`.
///
/// A construction problem never aborts the run; a failed evaluation is returned
/// after the network reports have been written.
pub fn analyze_fault(
    path: &Path,
    target: &FaultTarget,
    config: &EngineConfig,
    output_dir: &Path,
) -> Result<FaultReport> {
    let outcome = build_from_path(path, config)?;
    let exporter = ReportExporter::new(&outcome.network, &outcome.diagnostics);
    exporter.export_network(output_dir)?;
    exporter.export_capacitance_lookup(output_dir)?;

    info!(%target, "Evaluating fault...");
    let report = FaultEvaluator::from_config(&config.solver).evaluate(&outcome.network, target)?;
    exporter.export_fault(output_dir, &report)?;
    Ok(report)
}
