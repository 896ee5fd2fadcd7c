//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::Mutex;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::{ident::RawValue, material::MaterialClass, solver::SolverSession};

// ---------------------------------------------------------------------------
// Input records, as supplied by the geometry/attribute loader.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub id: RawValue,
    #[serde(default)]
    pub x: RawValue,
    #[serde(default)]
    pub y: RawValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineRecord {
    #[serde(default)]
    pub id: RawValue,
    #[serde(default)]
    pub from_id: RawValue,
    #[serde(default)]
    pub to_id: RawValue,
    #[serde(default)]
    pub length_m: RawValue,
    #[serde(default)]
    pub r_ohm_per_km: RawValue,
    #[serde(default)]
    pub x_ohm_per_km: RawValue,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub i_max_a: RawValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformerRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lv_node_id: RawValue,
    #[serde(default)]
    pub substation_id: RawValue,
    #[serde(default)]
    pub rated_power_va: RawValue,
    #[serde(default)]
    pub u_primary_v: RawValue,
    #[serde(default)]
    pub u_secondary_v: RawValue,
    #[serde(default)]
    pub p_cu_kw: RawValue,
    #[serde(default)]
    pub p_fe_kw: RawValue,
    #[serde(default)]
    pub i0_percent: RawValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubstationRecord {
    #[serde(default)]
    pub id: RawValue,
    #[serde(default)]
    pub x: RawValue,
    #[serde(default)]
    pub y: RawValue,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadRecord {
    #[serde(default)]
    pub node_id: RawValue,
    #[serde(default)]
    pub metering_point_id: RawValue,
}

/// All input tables for one network instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub lines: Vec<LineRecord>,
    #[serde(default)]
    pub transformers: Vec<TransformerRecord>,
    #[serde(default)]
    pub substations: Vec<SubstationRecord>,
    #[serde(default)]
    pub loads: Vec<LoadRecord>,
}

// ---------------------------------------------------------------------------
// Network elements.
// ---------------------------------------------------------------------------

/// Position of a bus inside [`Network::buses`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusIdx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bus {
    pub index: BusIdx,
    pub id: String,
    pub vn_kv: f64,
    pub coordinate: Option<Point>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub id: String,
    pub from_bus: BusIdx,
    pub to_bus: BusIdx,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub c_nf_per_km: f64,
    pub max_i_ka: f64,
    pub material: MaterialClass,
}

impl Line {
    /// Series impedance of the whole segment in ohm, as (R, X).
    pub fn series_impedance_ohm(&self) -> (f64, f64) {
        (
            self.r_ohm_per_km * self.length_km,
            self.x_ohm_per_km * self.length_km,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformerParams {
    pub sn_mva: f64,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vk_percent: f64,
    pub vkr_percent: f64,
    pub pfe_kw: f64,
    pub i0_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transformer {
    pub name: String,
    pub hv_bus: BusIdx,
    pub lv_bus: BusIdx,
    pub substation_id: String,
    pub params: TransformerParams,
    /// Set when the representative parameter set replaced unparsable fields.
    pub defaulted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub bus: BusIdx,
    pub vm_pu: f64,
    pub substation_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Load {
    pub bus: BusIdx,
    pub metering_point_id: String,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Edge payload of the topology graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Line(usize),
    Transformer(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    pub buses: usize,
    pub lines: usize,
    pub transformers: usize,
    pub sources: usize,
    pub loads: usize,
}

/// One assembled distribution network.
///
/// Element collections are append-only and only grown by the builder and the
/// substation resolver. The solver session is transient state owned by fault
/// evaluation and is empty whenever no evaluation is in flight.
#[derive(Debug, Default)]
pub struct Network {
    buses: Vec<Bus>,
    lines: Vec<Line>,
    transformers: Vec<Transformer>,
    sources: Vec<Source>,
    loads: Vec<Load>,
    bus_index: IndexMap<String, BusIdx>,
    line_index: HashMap<String, usize>,
    source_index: HashMap<String, usize>,
    load_index: HashMap<String, usize>,
    pub(crate) session: Mutex<SolverSession>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn transformers(&self) -> &[Transformer] {
        &self.transformers
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    /// Normalised node id to bus mapping, in creation order.
    pub fn bus_map(&self) -> &IndexMap<String, BusIdx> {
        &self.bus_index
    }

    pub fn bus(&self, index: BusIdx) -> &Bus {
        &self.buses[index.0]
    }

    pub fn bus_by_id(&self, id: &str) -> Option<&Bus> {
        self.bus_index.get(id).map(|idx| &self.buses[idx.0])
    }

    pub fn line_by_id(&self, id: &str) -> Option<&Line> {
        self.line_index.get(id).map(|&idx| &self.lines[idx])
    }

    pub fn source_for_substation(&self, substation_id: &str) -> Option<&Source> {
        self.source_index
            .get(substation_id)
            .map(|&idx| &self.sources[idx])
    }

    pub fn load_for_metering_point(&self, metering_point_id: &str) -> Option<&Load> {
        self.load_index
            .get(metering_point_id)
            .map(|&idx| &self.loads[idx])
    }

    /// Overwrite the power of the load currently mapped to a metering point.
    /// Returns `false` when the metering point is unknown.
    pub fn assign_load_power(&mut self, metering_point_id: &str, p_mw: f64, q_mvar: f64) -> bool {
        match self.load_index.get(metering_point_id) {
            Some(&idx) => {
                let load = &mut self.loads[idx];
                load.p_mw = p_mw;
                load.q_mvar = q_mvar;
                true
            }
            None => false,
        }
    }

    /// `true` when no fault configuration or result is attached.
    pub fn solver_idle(&self) -> bool {
        self.session.lock().is_empty()
    }

    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            buses: self.buses.len(),
            lines: self.lines.len(),
            transformers: self.transformers.len(),
            sources: self.sources.len(),
            loads: self.loads.len(),
        }
    }

    /// Undirected bus graph with one edge per line and transformer.
    /// Node weights are bus indices, node `i` of the graph is bus `i`.
    pub fn topology(&self) -> UnGraph<BusIdx, Branch> {
        let mut graph = UnGraph::with_capacity(self.buses.len(), self.lines.len());
        for bus in &self.buses {
            graph.add_node(bus.index);
        }
        for (idx, line) in self.lines.iter().enumerate() {
            graph.add_edge(
                NodeIndex::new(line.from_bus.0),
                NodeIndex::new(line.to_bus.0),
                Branch::Line(idx),
            );
        }
        for (idx, trafo) in self.transformers.iter().enumerate() {
            graph.add_edge(
                NodeIndex::new(trafo.hv_bus.0),
                NodeIndex::new(trafo.lv_bus.0),
                Branch::Transformer(idx),
            );
        }
        graph
    }

    pub(crate) fn add_bus(&mut self, id: String, vn_kv: f64, coordinate: Option<Point>) -> BusIdx {
        let index = BusIdx(self.buses.len());
        self.bus_index.insert(id.clone(), index);
        self.buses.push(Bus {
            index,
            id,
            vn_kv,
            coordinate,
        });
        index
    }

    pub(crate) fn contains_line(&self, id: &str) -> bool {
        self.line_index.contains_key(id)
    }

    pub(crate) fn add_line(&mut self, line: Line) {
        self.line_index.insert(line.id.clone(), self.lines.len());
        self.lines.push(line);
    }

    pub(crate) fn add_source(&mut self, source: Source) {
        self.source_index
            .insert(source.substation_id.clone(), self.sources.len());
        self.sources.push(source);
    }

    pub(crate) fn add_transformer(&mut self, transformer: Transformer) {
        self.transformers.push(transformer);
    }

    /// Append a load and point its metering-point key at it. Returns `true`
    /// when the key previously mapped to another load.
    pub(crate) fn add_load(&mut self, load: Load) -> bool {
        let previous = self
            .load_index
            .insert(load.metering_point_id.clone(), self.loads.len());
        self.loads.push(load);
        previous.is_some()
    }
}
