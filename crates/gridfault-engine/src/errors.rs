//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("yaml serialization error: {0}")]
    YamlSerializationFailed(#[from] serde_yaml::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Failures surfaced to the caller of a fault evaluation. None of them are fatal:
/// the caller may retry with a different target.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum SimulationError {
    #[error("fault target not found")]
    TargetNotFound,
    #[error("target {target} not in network")]
    TargetNotInNetwork { target: String },
    #[error("no fault target selected")]
    NoTargetSelected,
    #[error("simulation produced no result for bus {bus}")]
    NoResult { bus: String },
}
