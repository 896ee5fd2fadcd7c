//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Command line interface for network construction and fault evaluation."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use gridfault_common::EngineConfig;
use gridfault_engine::{
    build_from_path,
    material::{capacitance_lookup, classify, CapacitanceLookupRow},
    ErrorClass, ReportExporter,
};
use serde_json::json;

#[derive(Debug, Args)]
pub struct BuildCommand {
    /// CSV table directory or JSON/YAML dataset.
    #[arg(long, short = 'i', value_name = "PATH")]
    input: PathBuf,

    /// Directory receiving network_summary.json, diagnostics.json and capacitance_lookup.csv.
    #[arg(long, short = 'o', value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print the summary and diagnostics as JSON.
    #[arg(long)]
    json: bool,
}

impl BuildCommand {
    pub fn execute(self, config: &EngineConfig) -> Result<()> {
        let outcome = build_from_path(&self.input, config)
            .with_context(|| format!("failed to build network from {}", self.input.display()))?;
        let summary = outcome.network.summary();

        if let Some(dir) = &self.output {
            let exporter = ReportExporter::new(&outcome.network, &outcome.diagnostics);
            exporter.export_network(dir)?;
            exporter.export_capacitance_lookup(dir)?;
        }

        if self.json {
            let body = json!({
                "summary": summary,
                "diagnostics": outcome.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(());
        }

        println!(
            "Buses: {}\nLines: {}\nTransformers: {}\nSources: {}\nLoads: {}",
            summary.buses, summary.lines, summary.transformers, summary.sources, summary.loads
        );
        let count = |class: ErrorClass| {
            outcome
                .diagnostics
                .iter()
                .filter(|d| d.class == class)
                .count()
        };
        println!(
            "Diagnostics: {} (mapping {}, parse {}, duplicate {})",
            outcome.diagnostics.len(),
            count(ErrorClass::Mapping),
            count(ErrorClass::Parse),
            count(ErrorClass::Duplicate)
        );
        for diagnostic in outcome.diagnostics.iter() {
            println!(
                "  {:?} row {}: {}",
                diagnostic.element, diagnostic.row, diagnostic.message
            );
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct CapacitanceCommand {
    /// Dataset whose line materials populate the table.
    #[arg(long, short = 'i', value_name = "PATH", conflicts_with = "material")]
    input: Option<PathBuf>,

    /// Classify free-text material descriptors instead of a dataset.
    #[arg(long, short = 'm', value_name = "TEXT", num_args = 1..)]
    material: Vec<String>,

    #[arg(long, short = 'o', value_name = "DIR")]
    output: Option<PathBuf>,
}

impl CapacitanceCommand {
    pub fn execute(self, config: &EngineConfig) -> Result<()> {
        let rows = match &self.input {
            Some(input) => {
                let outcome = build_from_path(input, config)?;
                if let Some(dir) = &self.output {
                    let path = ReportExporter::new(&outcome.network, &outcome.diagnostics)
                        .export_capacitance_lookup(dir)?;
                    println!("Wrote {}", path.display());
                }
                capacitance_lookup(outcome.network.lines().iter().map(|line| &line.material))
            }
            None if !self.material.is_empty() => {
                let classes: Vec<_> = self
                    .material
                    .iter()
                    .map(|text| classify(Some(text)))
                    .collect();
                for (text, class) in self.material.iter().zip(&classes) {
                    let c = class
                        .capacitance_nf_per_km()
                        .map(|c| format!("{c:.3} nF/km"))
                        .unwrap_or_else(|| "unknown".to_string());
                    println!(
                        "{text}: {:?}, {:?}, {} -> {c}",
                        class.conductor,
                        class.voltage_class,
                        class
                            .cross_section_mm2
                            .map(|s| format!("{s} mm2"))
                            .unwrap_or_else(|| "no cross-section".to_string())
                    );
                }
                capacitance_lookup(&classes)
            }
            None => bail!("either --input or --material is required"),
        };
        print_rows(&rows);
        Ok(())
    }
}

fn print_rows(rows: &[CapacitanceLookupRow]) {
    if rows.is_empty() {
        println!("No line material with a known capacitance");
        return;
    }
    println!(
        "{:<16} {:<8} {:>8} {:>12} {:>8}",
        "conductor", "class", "mm2", "nF/km", "samples"
    );
    for row in rows {
        println!(
            "{:<16} {:<8} {:>8} {:>12.3} {:>8}",
            format!("{:?}", row.conductor),
            format!("{:?}", row.voltage_class),
            row.cross_section_mm2,
            row.c_nf_per_km,
            row.samples
        );
    }
}
