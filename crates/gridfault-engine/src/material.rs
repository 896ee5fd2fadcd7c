//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Line material classification and geometry-based earth capacitance.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Vacuum permittivity [F/m].
pub const EPSILON_0: f64 = 8.854e-12;
/// Average pole height assumed for overhead conductors [m].
pub const POLE_HEIGHT_M: f64 = 10.0;
/// Relative permittivity of cross-linked polyethylene insulation.
pub const XLPE_RELATIVE_PERMITTIVITY: f64 = 3.5;
/// Insulation outer diameter expressed as a multiple of the conductor radius.
pub const INSULATION_DIAMETER_RATIO: f64 = 3.0;

// F/m -> nF/km
const F_PER_M_TO_NF_PER_KM: f64 = 1e12;

static CROSS_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2,3})\s*MM2").expect("cross-section pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConductorType {
    InsulatedCable,
    BareConductor,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoltageClass {
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialClass {
    pub conductor: ConductorType,
    pub voltage_class: VoltageClass,
    pub cross_section_mm2: Option<u32>,
}

impl MaterialClass {
    pub const UNKNOWN: MaterialClass = MaterialClass {
        conductor: ConductorType::Unknown,
        voltage_class: VoltageClass::Low,
        cross_section_mm2: None,
    };

    pub fn capacitance_nf_per_km(&self) -> Option<f64> {
        capacitance_nf_per_km(self.conductor, self.cross_section_mm2.map(f64::from))
    }
}

/// Classify a free-text material descriptor. Total: never fails.
pub fn classify(material: Option<&str>) -> MaterialClass {
    let Some(material) = material else {
        return MaterialClass::UNKNOWN;
    };
    let text = material.to_uppercase();

    let conductor = if text.contains("KABEL") {
        ConductorType::InsulatedCable
    } else if text.contains("VODNIK") || text.contains("GOLI") {
        ConductorType::BareConductor
    } else {
        ConductorType::Unknown
    };

    let voltage_class = if text.contains("24KV") || text.contains("SN") {
        VoltageClass::Medium
    } else {
        VoltageClass::Low
    };

    let cross_section_mm2 = CROSS_SECTION
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());

    MaterialClass {
        conductor,
        voltage_class,
        cross_section_mm2,
    }
}

/// Per-length earth capacitance in nF/km, or `None` when it cannot be derived.
///
/// Bare conductors use the single wire over ground formula `2πε0 / ln(2h/r)`,
/// insulated cables the coaxial formula `2πε0εr / ln(D/r)`.
pub fn capacitance_nf_per_km(
    conductor: ConductorType,
    cross_section_mm2: Option<f64>,
) -> Option<f64> {
    let area_mm2 = cross_section_mm2.filter(|a| a.is_finite() && *a > 0.0)?;
    let radius_m = (area_mm2 / PI).sqrt() / 1000.0;

    let c_per_m = match conductor {
        ConductorType::BareConductor => {
            let h = POLE_HEIGHT_M;
            if 2.0 * h <= radius_m {
                return None;
            }
            2.0 * PI * EPSILON_0 / (2.0 * h / radius_m).ln()
        }
        ConductorType::InsulatedCable => {
            let outer = INSULATION_DIAMETER_RATIO * radius_m;
            if outer <= radius_m {
                return None;
            }
            2.0 * PI * EPSILON_0 * XLPE_RELATIVE_PERMITTIVITY / (outer / radius_m).ln()
        }
        ConductorType::Unknown => return None,
    };

    Some(c_per_m * F_PER_M_TO_NF_PER_KM)
}

/// One row of the categorical capacitance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitanceLookupRow {
    pub conductor: ConductorType,
    pub voltage_class: VoltageClass,
    pub cross_section_mm2: u32,
    pub c_nf_per_km: f64,
    pub samples: usize,
}

/// Group classified materials by category and average their capacitance.
///
/// Entries whose capacitance is unknown are left out. Rows are sorted by
/// conductor type, voltage class and cross-section.
pub fn capacitance_lookup<'a, I>(materials: I) -> Vec<CapacitanceLookupRow>
where
    I: IntoIterator<Item = &'a MaterialClass>,
{
    let mut groups: BTreeMap<(ConductorType, VoltageClass, u32), (f64, usize)> = BTreeMap::new();
    for material in materials {
        let (Some(section), Some(c)) = (material.cross_section_mm2, material.capacitance_nf_per_km())
        else {
            continue;
        };
        let entry = groups
            .entry((material.conductor, material.voltage_class, section))
            .or_insert((0.0, 0));
        entry.0 += c;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(
            |((conductor, voltage_class, cross_section_mm2), (sum, samples))| CapacitanceLookupRow {
                conductor,
                voltage_class,
                cross_section_mm2,
                c_nf_per_km: sum / samples as f64,
                samples,
            },
        )
        .collect()
}
