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
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use gridfault_common::EngineConfig;
use gridfault_engine::{
    build_from_path, FaultEvaluator, FaultKind, FaultLocator, FaultTarget, ReportExporter,
};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    SinglePhase,
    ThreePhase,
}

impl From<KindArg> for FaultKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::SinglePhase => FaultKind::SinglePhaseToGround,
            KindArg::ThreePhase => FaultKind::ThreePhase,
        }
    }
}

#[derive(Debug, Args)]
pub struct FaultCommand {
    /// CSV table directory or JSON/YAML dataset.
    #[arg(long, short = 'i', value_name = "PATH")]
    input: PathBuf,

    /// Fault on the line with this identifier (reported at its from-bus).
    #[arg(long, value_name = "ID", conflicts_with_all = ["bus", "point"])]
    line: Option<String>,

    /// Fault directly at the bus with this node identifier.
    #[arg(long, value_name = "ID", conflicts_with = "point")]
    bus: Option<String>,

    /// Map position as X,Y; combine with --label to name the line under it.
    #[arg(long, value_name = "X,Y")]
    point: Option<String>,

    #[arg(long, value_name = "LINE", requires = "point")]
    label: Option<String>,

    #[arg(long, value_enum, default_value_t = KindArg::SinglePhase)]
    kind: KindArg,

    /// Override the solver timeout in milliseconds.
    #[arg(long = "timeout-ms", value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Directory receiving fault_report.json and the network reports.
    #[arg(long, short = 'o', value_name = "DIR")]
    output: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

impl FaultCommand {
    pub fn execute(self, config: &EngineConfig) -> Result<()> {
        let mut locator = FaultLocator::new();
        locator.select(self.target()?)?;

        let outcome = build_from_path(&self.input, config)
            .with_context(|| format!("failed to build network from {}", self.input.display()))?;
        let mut evaluator = FaultEvaluator::from_config(&config.solver);
        if let Some(ms) = self.timeout_ms {
            evaluator = evaluator.with_timeout(Some(Duration::from_millis(ms)));
        }

        let target = locator
            .target()
            .ok_or_else(|| anyhow!("no fault target selected"))?;
        let report = evaluator.evaluate_kind(&outcome.network, target, self.kind.into())?;

        if let Some(dir) = &self.output {
            let exporter = ReportExporter::new(&outcome.network, &outcome.diagnostics);
            exporter.export_network(dir)?;
            let path = exporter.export_fault(dir, &report)?;
            info!(path = %path.display(), "fault report written");
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{report}");
        }
        Ok(())
    }

    fn target(&self) -> Result<FaultTarget> {
        if let Some(id) = &self.line {
            return Ok(FaultTarget::line(id.as_str()));
        }
        if let Some(id) = &self.bus {
            return Ok(FaultTarget::bus(id.as_str()));
        }
        if let Some(point) = &self.point {
            let (x, y) = parse_point(point)?;
            return Ok(FaultTarget::Point {
                x,
                y,
                label: self.label.clone(),
            });
        }
        Err(anyhow!("one of --line, --bus or --point is required"))
    }
}

fn parse_point(text: &str) -> Result<(f64, f64)> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| anyhow!("point must be given as X,Y, got {text:?}"))?;
    let x = x.trim().parse().with_context(|| format!("invalid X in {text:?}"))?;
    let y = y.trim().parse().with_context(|| format!("invalid Y in {text:?}"))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_point_pairs() {
        assert_eq!(parse_point("12.5, -3").unwrap(), (12.5, -3.0));
        assert!(parse_point("12.5").is_err());
        assert!(parse_point("a,b").is_err());
    }
}
