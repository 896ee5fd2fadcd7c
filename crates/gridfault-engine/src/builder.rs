//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use gridfault_common::config::NetworkConfig;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    diagnostics::{BuildIssue, Diagnostics, ElementKind, Outcome},
    ident::{normalize, parse_decimal, NormalizedId, RawValue},
    material::classify,
    model::{Dataset, Line, LineRecord, Load, LoadRecord, Network, NodeRecord, Point},
    substation::attach_sources,
};

/// Network plus everything that went wrong while assembling it.
#[derive(Debug, Serialize)]
pub struct BuildOutcome {
    #[serde(skip)]
    pub network: Network,
    pub diagnostics: Diagnostics,
}

/// Assemble buses, lines and loads from normalised records.
pub struct NetworkBuilder<'a> {
    config: &'a NetworkConfig,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(config: &'a NetworkConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        nodes: &[NodeRecord],
        lines: &[LineRecord],
        loads: &[LoadRecord],
    ) -> BuildOutcome {
        let mut network = Network::new();
        let mut diagnostics = Diagnostics::new();

        self.add_buses(&mut network, &mut diagnostics, nodes);
        self.add_lines(&mut network, &mut diagnostics, lines);
        self.add_loads(&mut network, &mut diagnostics, loads);

        info!(
            buses = network.buses().len(),
            lines = network.lines().len(),
            loads = network.loads().len(),
            diagnostics = diagnostics.len(),
            "network graph assembled"
        );
        BuildOutcome {
            network,
            diagnostics,
        }
    }

    fn add_buses(&self, network: &mut Network, diagnostics: &mut Diagnostics, nodes: &[NodeRecord]) {
        for (row, record) in nodes.iter().enumerate() {
            let Some(id) = normalize(&record.id).into_key() else {
                diagnostics.skip(ElementKind::Bus, row, invalid_identifier("id", &record.id));
                continue;
            };
            let parsed = bus_coordinate(record);
            let coordinate = parsed.as_ref().ok().copied().flatten();

            if let Some(existing) = network.bus_by_id(&id) {
                if existing.coordinate == coordinate {
                    debug!(bus = %id, row, "identical node record ignored");
                } else {
                    diagnostics.skip(ElementKind::Bus, row, BuildIssue::DuplicateBus { id });
                }
                continue;
            }
            network.add_bus(id, self.config.nominal_voltage_kv, coordinate);
            if let Err(issue) = parsed {
                // The bus stays usable for joins, it just cannot host a substation.
                diagnostics.record(ElementKind::Bus, row, issue, Outcome::Defaulted);
            }
        }
    }

    fn add_lines(&self, network: &mut Network, diagnostics: &mut Diagnostics, lines: &[LineRecord]) {
        for (row, record) in lines.iter().enumerate() {
            let from = normalize(&record.from_id);
            let to = normalize(&record.to_id);
            let endpoints = (
                from.as_key().and_then(|key| network.bus_by_id(key)).map(|b| b.index),
                to.as_key().and_then(|key| network.bus_by_id(key)).map(|b| b.index),
            );
            let (Some(from_bus), Some(to_bus)) = endpoints else {
                diagnostics.skip(
                    ElementKind::Line,
                    row,
                    BuildIssue::UnmappedEndpoints {
                        from: from.to_string(),
                        to: to.to_string(),
                    },
                );
                continue;
            };

            let (length_m, r_ohm_per_km, x_ohm_per_km, i_max_a) = match parse_line_values(record) {
                Ok(values) => values,
                Err(issue) => {
                    diagnostics.skip(ElementKind::Line, row, issue);
                    continue;
                }
            };

            let (id, taken) = unique_line_id(network, normalize(&record.id), row);
            let material = classify(record.material.as_deref());
            let c_nf_per_km = material.capacitance_nf_per_km().unwrap_or(0.0);

            network.add_line(Line {
                id: id.clone(),
                from_bus,
                to_bus,
                length_km: length_m / 1000.0,
                r_ohm_per_km,
                x_ohm_per_km,
                c_nf_per_km,
                max_i_ka: i_max_a / 1000.0,
                material,
            });
            if let Some(taken) = taken {
                diagnostics.record(
                    ElementKind::Line,
                    row,
                    BuildIssue::DuplicateLine { id: taken, renamed: id },
                    Outcome::Renamed,
                );
            }
        }
    }

    fn add_loads(&self, network: &mut Network, diagnostics: &mut Diagnostics, loads: &[LoadRecord]) {
        for (row, record) in loads.iter().enumerate() {
            let node = normalize(&record.node_id);
            let Some(bus) = node.as_key().and_then(|key| network.bus_by_id(key)).map(|b| b.index)
            else {
                diagnostics.skip(
                    ElementKind::Load,
                    row,
                    BuildIssue::UnmappedNode {
                        node: node.to_string(),
                    },
                );
                continue;
            };
            let Some(metering_point_id) = normalize(&record.metering_point_id).into_key() else {
                diagnostics.skip(
                    ElementKind::Load,
                    row,
                    invalid_identifier("metering_point_id", &record.metering_point_id),
                );
                continue;
            };

            let remapped = network.add_load(Load {
                bus,
                metering_point_id: metering_point_id.clone(),
                p_mw: 0.0,
                q_mvar: 0.0,
            });
            if remapped {
                diagnostics.record(
                    ElementKind::Load,
                    row,
                    BuildIssue::DuplicateMeteringPoint {
                        metering_point: metering_point_id,
                    },
                    Outcome::Remapped,
                );
            }
        }
    }
}

/// Run the full construction pipeline: graph builder, then substation attachment.
pub fn build_network(dataset: &Dataset, config: &NetworkConfig) -> BuildOutcome {
    let BuildOutcome {
        mut network,
        mut diagnostics,
    } = NetworkBuilder::new(config).build(&dataset.nodes, &dataset.lines, &dataset.loads);
    attach_sources(
        &mut network,
        &dataset.substations,
        &dataset.transformers,
        config,
        &mut diagnostics,
    );
    BuildOutcome {
        network,
        diagnostics,
    }
}

/// Explicit id when free, else `Line {row}`, else `Line {row}.{n}`.
/// Returns the chosen id and, on a collision, the id that was already taken.
fn unique_line_id(
    network: &Network,
    explicit: NormalizedId,
    row: usize,
) -> (String, Option<String>) {
    let generated = format!("Line {row}");
    let requested = explicit.into_key().unwrap_or_else(|| generated.clone());
    if !network.contains_line(&requested) {
        return (requested, None);
    }
    let mut candidate = generated.clone();
    let mut suffix = 1;
    while network.contains_line(&candidate) {
        candidate = format!("{generated}.{suffix}");
        suffix += 1;
    }
    (candidate, Some(requested))
}

/// A node without any coordinate is fine; a half-filled or unparsable one is not.
fn bus_coordinate(record: &NodeRecord) -> Result<Option<Point>, BuildIssue> {
    if matches!((&record.x, &record.y), (RawValue::Missing, RawValue::Missing)) {
        return Ok(None);
    }
    require_point(&record.x, &record.y).map(Some)
}

pub(crate) fn require_point(x: &RawValue, y: &RawValue) -> Result<Point, BuildIssue> {
    Ok(Point {
        x: require_decimal("x", x)?,
        y: require_decimal("y", y)?,
    })
}

fn parse_line_values(record: &LineRecord) -> Result<(f64, f64, f64, f64), BuildIssue> {
    let length_m = require_decimal("length_m", &record.length_m)?;
    if length_m <= 0.0 {
        return Err(malformed("length_m", &record.length_m));
    }
    Ok((
        length_m,
        require_decimal("r_ohm_per_km", &record.r_ohm_per_km)?,
        require_decimal("x_ohm_per_km", &record.x_ohm_per_km)?,
        require_decimal("i_max_a", &record.i_max_a)?,
    ))
}

pub(crate) fn invalid_identifier(field: &'static str, raw: &RawValue) -> BuildIssue {
    BuildIssue::InvalidIdentifier {
        field,
        raw: raw.to_string(),
    }
}

pub(crate) fn malformed(field: &'static str, raw: &RawValue) -> BuildIssue {
    BuildIssue::MalformedField {
        field,
        raw: raw.to_string(),
    }
}

pub(crate) fn require_decimal(field: &'static str, raw: &RawValue) -> Result<f64, BuildIssue> {
    parse_decimal(raw).ok_or_else(|| malformed(field, raw))
}
