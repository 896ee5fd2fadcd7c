//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::{
    diagnostics::Diagnostics,
    errors::Result,
    fault::FaultReport,
    material::{capacitance_lookup, CapacitanceLookupRow},
    model::Network,
};

pub const SUMMARY_REPORT: &str = "network_summary.json";
pub const DIAGNOSTICS_REPORT: &str = "diagnostics.json";
pub const FAULT_REPORT: &str = "fault_report.json";
pub const CAPACITANCE_TABLE: &str = "capacitance_lookup.csv";

#[derive(Debug)]
pub struct ReportExporter<'a> {
    network: &'a Network,
    diagnostics: &'a Diagnostics,
    timestamp: DateTime<Utc>,
}

impl<'a> ReportExporter<'a> {
    pub fn new(network: &'a Network, diagnostics: &'a Diagnostics) -> Self {
        Self {
            network,
            diagnostics,
            timestamp: Utc::now(),
        }
    }

    /// Summary, diagnostics and capacitance table; the fault report when one is given.
    pub fn export_all(&self, output_dir: &Path, fault: Option<&FaultReport>) -> Result<()> {
        self.export_network(output_dir)?;
        self.export_capacitance_lookup(output_dir)?;
        if let Some(fault) = fault {
            self.export_fault(output_dir, fault)?;
        }
        info!("Reports exported to {}", output_dir.display());
        Ok(())
    }

    pub fn export_network(&self, output_dir: &Path) -> Result<()> {
        ensure_dir(output_dir)?;
        let timestamp = self.timestamp.to_rfc3339();
        let summary = self.network.summary();
        let summary = ReportEnvelope::new(&timestamp, summary_schema(), &summary);
        let diagnostics = ReportEnvelope::new(&timestamp, diagnostics_schema(), self.diagnostics);
        write_json(output_dir.join(SUMMARY_REPORT), &summary)?;
        write_json(output_dir.join(DIAGNOSTICS_REPORT), &diagnostics)?;
        Ok(())
    }

    pub fn export_fault(&self, output_dir: &Path, report: &FaultReport) -> Result<PathBuf> {
        ensure_dir(output_dir)?;
        let timestamp = self.timestamp.to_rfc3339();
        let envelope = ReportEnvelope::new(&timestamp, fault_schema(), report);
        let path = output_dir.join(FAULT_REPORT);
        write_json(&path, &envelope)?;
        Ok(path)
    }

    pub fn capacitance_rows(&self) -> Vec<CapacitanceLookupRow> {
        capacitance_lookup(self.network.lines().iter().map(|line| &line.material))
    }

    pub fn export_capacitance_lookup(&self, output_dir: &Path) -> Result<PathBuf> {
        ensure_dir(output_dir)?;
        let path = output_dir.join(CAPACITANCE_TABLE);
        let mut writer = csv::Writer::from_path(&path)?;
        for row in self.capacitance_rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize> {
    timestamp: &'a str,
    engine_version: &'static str,
    schema: serde_json::Value,
    data: &'a T,
}

impl<'a, T: Serialize> ReportEnvelope<'a, T> {
    fn new(timestamp: &'a str, schema: serde_json::Value, data: &'a T) -> Self {
        Self {
            timestamp,
            engine_version: env!("CARGO_PKG_VERSION"),
            schema,
            data,
        }
    }
}

fn ensure_dir(output_dir: &Path) -> Result<()> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir)?;
    }
    Ok(())
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn summary_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "NetworkSummary",
        "type": "object",
        "properties": {
            "buses": {"type": "integer"},
            "lines": {"type": "integer"},
            "transformers": {"type": "integer"},
            "sources": {"type": "integer"},
            "loads": {"type": "integer"}
        },
        "required": ["buses", "lines", "transformers", "sources", "loads"]
    })
}

fn diagnostics_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "BuildDiagnostics",
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "element": {"enum": ["bus", "line", "load", "substation", "transformer"]},
                "row": {"type": "integer"},
                "class": {"enum": ["mapping", "parse", "duplicate"]},
                "outcome": {"enum": ["skipped", "defaulted", "remapped", "renamed"]},
                "issue": {"type": "string"},
                "message": {"type": "string"}
            },
            "required": ["element", "row", "class", "outcome", "issue", "message"]
        }
    })
}

fn fault_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "FaultReport",
        "type": "object",
        "properties": {
            "fault_bus_id": {"type": "string"},
            "line_id": {"type": ["string", "null"]},
            "fault_kind": {"enum": ["single_phase_to_ground", "three_phase"]},
            "fault_current_ka": {"type": "number"}
        },
        "required": ["fault_bus_id", "fault_kind", "fault_current_ka"]
    })
}
