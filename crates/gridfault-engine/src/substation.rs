//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Substation attachment: external grid feed-ins and the transformers hanging off them.

use gridfault_common::config::{NetworkConfig, TransformerFallbackConfig};
use tracing::{debug, info};

use crate::{
    builder::{invalid_identifier, require_decimal, require_point},
    diagnostics::{BuildIssue, Diagnostics, ElementKind, Outcome},
    ident::normalize,
    model::{Bus, Network, Point, Source, SubstationRecord, Transformer, TransformerParams, TransformerRecord},
};

/// Bus closest to `point`, by planar distance. Ties keep the first bus encountered.
/// Buses without a coordinate are not candidates, and a non-finite point has none.
pub fn nearest_bus<'a>(buses: &'a [Bus], point: &Point) -> Option<(&'a Bus, f64)> {
    if !(point.x.is_finite() && point.y.is_finite()) {
        return None;
    }
    let mut best: Option<(&Bus, f64)> = None;
    for bus in buses {
        let Some(coordinate) = bus.coordinate else {
            continue;
        };
        let distance = coordinate.distance(point);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((bus, distance)),
        }
    }
    best
}

/// Register one source per substation at its nearest bus, then link transformers.
pub fn attach_sources(
    network: &mut Network,
    substations: &[SubstationRecord],
    transformers: &[TransformerRecord],
    config: &NetworkConfig,
    diagnostics: &mut Diagnostics,
) {
    register_sources(network, substations, config, diagnostics);
    link_transformers(network, transformers, config, diagnostics);
    info!(
        sources = network.sources().len(),
        transformers = network.transformers().len(),
        "substations attached"
    );
}

fn register_sources(
    network: &mut Network,
    substations: &[SubstationRecord],
    config: &NetworkConfig,
    diagnostics: &mut Diagnostics,
) {
    for (row, record) in substations.iter().enumerate() {
        let Some(substation_id) = normalize(&record.id).into_key() else {
            diagnostics.skip(ElementKind::Substation, row, invalid_identifier("id", &record.id));
            continue;
        };
        if network.source_for_substation(&substation_id).is_some() {
            diagnostics.skip(
                ElementKind::Substation,
                row,
                BuildIssue::DuplicateSubstation {
                    substation: substation_id,
                },
            );
            continue;
        }

        let point = match require_point(&record.x, &record.y) {
            Ok(point) => point,
            Err(issue) => {
                diagnostics.skip(ElementKind::Substation, row, issue);
                continue;
            }
        };
        let Some((bus, distance)) = nearest_bus(network.buses(), &point) else {
            diagnostics.skip(
                ElementKind::Substation,
                row,
                BuildIssue::NoCandidateBus {
                    substation: substation_id,
                },
            );
            continue;
        };
        let bus = bus.index;
        debug!(substation = %substation_id, bus = %network.bus(bus).id, distance, "substation attached");

        let name = record
            .name
            .clone()
            .unwrap_or_else(|| format!("Substation {substation_id}"));
        network.add_source(Source {
            bus,
            vm_pu: config.source_vm_pu,
            substation_id,
            name,
        });
    }
}

fn link_transformers(
    network: &mut Network,
    transformers: &[TransformerRecord],
    config: &NetworkConfig,
    diagnostics: &mut Diagnostics,
) {
    for (row, record) in transformers.iter().enumerate() {
        let node = normalize(&record.lv_node_id);
        let Some(lv_bus) = node.as_key().and_then(|key| network.bus_by_id(key)).map(|b| b.index)
        else {
            diagnostics.skip(
                ElementKind::Transformer,
                row,
                BuildIssue::UnmappedNode {
                    node: node.to_string(),
                },
            );
            continue;
        };

        let substation = normalize(&record.substation_id);
        let Some(source) = substation
            .as_key()
            .and_then(|key| network.source_for_substation(key))
        else {
            diagnostics.skip(
                ElementKind::Transformer,
                row,
                BuildIssue::UnmappedSubstation {
                    substation: substation.to_string(),
                },
            );
            continue;
        };
        let hv_bus = source.bus;
        let substation_id = source.substation_id.clone();

        let (params, defaulted) = match transformer_params(record, config.transformer_vk_percent) {
            Ok(params) => (params, false),
            Err(issue) => {
                let reason = issue.to_string();
                diagnostics.record(
                    ElementKind::Transformer,
                    row,
                    BuildIssue::DefaultedParameters { reason },
                    Outcome::Defaulted,
                );
                (fallback_params(&config.transformer_fallback), true)
            }
        };

        network.add_transformer(Transformer {
            name: record
                .name
                .clone()
                .unwrap_or_else(|| format!("Transformer {row}")),
            hv_bus,
            lv_bus,
            substation_id,
            params,
            defaulted,
        });
    }
}

/// Derive electrical parameters from the textual transformer fields.
///
/// The resistive impedance fraction follows from the copper losses; the total
/// short-circuit impedance is the configured constant.
pub fn transformer_params(
    record: &TransformerRecord,
    vk_percent: f64,
) -> Result<TransformerParams, BuildIssue> {
    let sn_mva = require_decimal("rated_power_va", &record.rated_power_va)? / 1e6;
    let vn_hv_kv = require_decimal("u_primary_v", &record.u_primary_v)? / 1000.0;
    let vn_lv_kv = require_decimal("u_secondary_v", &record.u_secondary_v)? / 1000.0;
    let p_cu_kw = require_decimal("p_cu_kw", &record.p_cu_kw)?;
    let pfe_kw = require_decimal("p_fe_kw", &record.p_fe_kw)?;
    let i0_percent = require_decimal("i0_percent", &record.i0_percent)?;

    for (field, value, raw) in [
        ("rated_power_va", sn_mva, &record.rated_power_va),
        ("u_primary_v", vn_hv_kv, &record.u_primary_v),
        ("u_secondary_v", vn_lv_kv, &record.u_secondary_v),
    ] {
        if value <= 0.0 {
            return Err(BuildIssue::MalformedField {
                field,
                raw: raw.to_string(),
            });
        }
    }

    Ok(TransformerParams {
        sn_mva,
        vn_hv_kv,
        vn_lv_kv,
        vk_percent,
        vkr_percent: p_cu_kw * 100.0 / (sn_mva * 1000.0),
        pfe_kw,
        i0_percent,
    })
}

pub fn fallback_params(fallback: &TransformerFallbackConfig) -> TransformerParams {
    TransformerParams {
        sn_mva: fallback.sn_mva,
        vn_hv_kv: fallback.vn_hv_kv,
        vn_lv_kv: fallback.vn_lv_kv,
        vk_percent: fallback.vk_percent,
        vkr_percent: fallback.vkr_percent,
        pfe_kw: fallback.pfe_kw,
        i0_percent: fallback.i0_percent,
    }
}
