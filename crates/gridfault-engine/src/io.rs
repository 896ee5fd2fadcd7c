//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::{fs, path::Path};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    errors::{EngineError, Result},
    model::Dataset,
};

pub const NODES_FILE: &str = "nodes.csv";
pub const LINES_FILE: &str = "lines.csv";
pub const TRANSFORMERS_FILE: &str = "transformers.csv";
pub const SUBSTATIONS_FILE: &str = "substations.csv";
pub const LOADS_FILE: &str = "loads.csv";

/// Read a whole dataset from one JSON or YAML document.
pub fn load_dataset_from_file(path: impl AsRef<Path>) -> Result<Dataset> {
    let data = fs::read_to_string(path)?;
    let dataset = if data.trim_start().starts_with('{') {
        serde_json::from_str(&data)?
    } else {
        serde_yaml::from_str(&data).map_err(EngineError::YamlSerializationFailed)?
    };
    Ok(dataset)
}

/// Read the five record tables from a directory of CSV files.
/// A missing table loads as empty.
pub fn load_dataset_from_dir(dir: impl AsRef<Path>) -> Result<Dataset> {
    let dir = dir.as_ref();
    Ok(Dataset {
        nodes: load_table(&dir.join(NODES_FILE))?,
        lines: load_table(&dir.join(LINES_FILE))?,
        transformers: load_table(&dir.join(TRANSFORMERS_FILE))?,
        substations: load_table(&dir.join(SUBSTATIONS_FILE))?,
        loads: load_table(&dir.join(LOADS_FILE))?,
    })
}

/// Dispatch on the path: directories are CSV table sets, files are documents.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    if path.is_dir() {
        load_dataset_from_dir(path)
    } else {
        load_dataset_from_file(path)
    }
}

fn load_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "input table missing, treating as empty");
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    debug!(path = %path.display(), rows = rows.len(), "input table loaded");
    Ok(rows)
}
