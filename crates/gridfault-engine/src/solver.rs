//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Short-circuit solver seam and the default symmetrical-component implementation.

use std::collections::HashMap;
use std::time::Instant;

use gridfault_common::config::SolverConfig;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use petgraph::{graph::NodeIndex, visit::Bfs};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{BusIdx, Network};

// Branches shorter than this are clamped to keep the admittance finite.
const MIN_IMPEDANCE_PU: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    SinglePhaseToGround,
    ThreePhase,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::SinglePhaseToGround => f.write_str("single-phase-to-ground"),
            FaultKind::ThreePhase => f.write_str("three-phase"),
        }
    }
}

/// Fault configuration handed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultSpec {
    pub bus: BusIdx,
    pub kind: FaultKind,
    pub impedance_ohm: f64,
}

impl FaultSpec {
    /// Bolted single-phase-to-ground fault.
    pub fn single_phase(bus: BusIdx) -> Self {
        Self {
            bus,
            kind: FaultKind::SinglePhaseToGround,
            impedance_ohm: 0.0,
        }
    }
}

/// Per-bus initial short-circuit current magnitudes in kA.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverOutput {
    pub currents_ka: HashMap<BusIdx, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("sequence admittance matrix is singular")]
    Singular,
    #[error("solver deadline expired")]
    Timeout,
}

/// Transient fault configuration and results attached to a network.
/// Empty whenever no evaluation is in flight.
#[derive(Debug, Default)]
pub struct SolverSession {
    active: Option<FaultSpec>,
    output: Option<SolverOutput>,
}

impl SolverSession {
    pub fn configure(&mut self, spec: FaultSpec) {
        self.active = Some(spec);
        self.output = None;
    }

    pub fn active(&self) -> Option<&FaultSpec> {
        self.active.as_ref()
    }

    pub fn store(&mut self, output: SolverOutput) {
        self.output = Some(output);
    }

    pub fn current_ka(&self, bus: BusIdx) -> Option<f64> {
        self.output
            .as_ref()
            .and_then(|output| output.currents_ka.get(&bus).copied())
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.output = None;
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.output.is_none()
    }
}

pub trait ShortCircuitSolver: Send + Sync {
    fn solve(
        &self,
        network: &Network,
        fault: &FaultSpec,
        deadline: Option<Instant>,
    ) -> Result<SolverOutput, SolverError>;
}

/// Thevenin impedances from positive- and zero-sequence nodal admittance
/// matrices, in per unit on `base_mva`.
#[derive(Debug, Clone, Default)]
pub struct SequenceNetworkSolver {
    config: SolverConfig,
}

impl SequenceNetworkSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn source_impedance(&self) -> Complex64 {
        let z = self.config.voltage_factor * self.config.base_mva / self.config.source_sc_mva;
        let rx = self.config.source_rx_ratio;
        let x = z / (1.0 + rx * rx).sqrt();
        Complex64::new(rx * x, x)
    }
}

/// Buses reachable from `start`, in BFS order.
fn connected_component(network: &Network, start: BusIdx) -> Vec<BusIdx> {
    let graph = network.topology();
    let mut bfs = Bfs::new(&graph, NodeIndex::new(start.0));
    let mut buses = Vec::new();
    while let Some(node) = bfs.next(&graph) {
        buses.push(graph[node]);
    }
    buses
}

fn clamp(z: Complex64) -> Complex64 {
    if z.norm() < MIN_IMPEDANCE_PU {
        Complex64::new(MIN_IMPEDANCE_PU, 0.0)
    } else {
        z
    }
}

fn add_series(y: &mut DMatrix<Complex64>, i: usize, j: usize, z: Complex64) {
    let admittance = clamp(z).inv();
    y[(i, i)] += admittance;
    y[(j, j)] += admittance;
    y[(i, j)] -= admittance;
    y[(j, i)] -= admittance;
}

fn add_shunt(y: &mut DMatrix<Complex64>, i: usize, z: Complex64) {
    y[(i, i)] += clamp(z).inv();
}

/// Diagonal entry `k` of `Y^-1`.
fn thevenin(
    y: DMatrix<Complex64>,
    k: usize,
    deadline: Option<Instant>,
) -> Result<Complex64, SolverError> {
    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return Err(SolverError::Timeout);
    }
    let n = y.nrows();
    let mut unit = DVector::<Complex64>::zeros(n);
    unit[k] = Complex64::new(1.0, 0.0);
    let z = y.lu().solve(&unit).ok_or(SolverError::Singular)?;
    let value = z[k];
    if !value.re.is_finite() || !value.im.is_finite() {
        return Err(SolverError::Singular);
    }
    Ok(value)
}

impl ShortCircuitSolver for SequenceNetworkSolver {
    fn solve(
        &self,
        network: &Network,
        fault: &FaultSpec,
        deadline: Option<Instant>,
    ) -> Result<SolverOutput, SolverError> {
        let component = connected_component(network, fault.bus);
        let local: HashMap<BusIdx, usize> = component
            .iter()
            .enumerate()
            .map(|(position, bus)| (*bus, position))
            .collect();

        let sources: Vec<usize> = network
            .sources()
            .iter()
            .filter_map(|source| local.get(&source.bus).copied())
            .collect();
        if sources.is_empty() {
            debug!(bus = %network.bus(fault.bus).id, "no source feeds the faulted component");
            return Ok(SolverOutput::default());
        }

        let cfg = &self.config;
        let vn_kv = network.bus(fault.bus).vn_kv;
        let z_base = vn_kv * vn_kv / cfg.base_mva;
        let n = component.len();
        let mut y1 = DMatrix::<Complex64>::zeros(n, n);
        let mut y0 = DMatrix::<Complex64>::zeros(n, n);

        let z_source = self.source_impedance();
        for &position in &sources {
            add_shunt(&mut y1, position, z_source);
            if cfg.source_z0_z1_ratio > 0.0 {
                add_shunt(&mut y0, position, z_source * cfg.source_z0_z1_ratio);
            }
        }

        for line in network.lines() {
            let (Some(&from), Some(&to)) = (local.get(&line.from_bus), local.get(&line.to_bus))
            else {
                continue;
            };
            let (r, x) = line.series_impedance_ohm();
            let line_base = network.bus(line.from_bus).vn_kv.powi(2) / cfg.base_mva;
            let z1 = Complex64::new(r, x) / line_base;
            add_series(&mut y1, from, to, z1);
            if cfg.line_zero_sequence_factor > 0.0 {
                add_series(&mut y0, from, to, z1 * cfg.line_zero_sequence_factor);
            }
        }

        for trafo in network.transformers() {
            let (Some(&hv), Some(&lv)) = (local.get(&trafo.hv_bus), local.get(&trafo.lv_bus))
            else {
                continue;
            };
            let params = &trafo.params;
            let zk = params.vk_percent / 100.0 * cfg.base_mva / params.sn_mva;
            let rk = params.vkr_percent / 100.0 * cfg.base_mva / params.sn_mva;
            let xk = (zk * zk - rk * rk).max(0.0).sqrt();
            let z1 = Complex64::new(rk, xk);
            if hv != lv {
                add_series(&mut y1, hv, lv, z1);
            }
            // Dyn: delta winding blocks zero sequence, grounded star on the LV side.
            if cfg.transformer_z0_z1_ratio > 0.0 {
                add_shunt(&mut y0, lv, z1 * cfg.transformer_z0_z1_ratio);
            }
        }

        let k = local[&fault.bus];
        let z1 = thevenin(y1, k, deadline)?;
        let i_base_ka = cfg.base_mva / (3.0f64.sqrt() * vn_kv);
        let c = cfg.voltage_factor;

        let ik_ka = match fault.kind {
            FaultKind::ThreePhase => c * i_base_ka / z1.norm(),
            FaultKind::SinglePhaseToGround => {
                let z0 = thevenin(y0, k, deadline)?;
                let zf = Complex64::new(fault.impedance_ohm / z_base, 0.0);
                3.0 * c * i_base_ka / (z1 * 2.0 + z0 + zf * 3.0).norm()
            }
        };

        info!(
            bus = %network.bus(fault.bus).id,
            kind = %fault.kind,
            component_buses = n,
            ik_ka,
            "short-circuit current computed"
        );
        let mut output = SolverOutput::default();
        output.currents_ka.insert(fault.bus, ik_ka);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_network;
    use crate::model::{Dataset, LineRecord, NodeRecord, SubstationRecord};
    use gridfault_common::config::NetworkConfig;
    use std::time::Duration;

    fn radial() -> Network {
        let node = |id: &str, x: f64| NodeRecord {
            id: id.into(),
            x: x.into(),
            y: 0.0f64.into(),
        };
        let dataset = Dataset {
            nodes: vec![node("A", 0.0), node("B", 1000.0), node("C", 5000.0)],
            lines: vec![LineRecord {
                id: "L1".into(),
                from_id: "A".into(),
                to_id: "B".into(),
                length_m: 1000i64.into(),
                r_ohm_per_km: 0.206f64.into(),
                x_ohm_per_km: 0.12f64.into(),
                material: None,
                i_max_a: 300i64.into(),
            }],
            substations: vec![SubstationRecord {
                id: "S".into(),
                x: 0.0f64.into(),
                y: 0.0f64.into(),
                name: None,
            }],
            ..Dataset::default()
        };
        build_network(&dataset, &NetworkConfig::default()).network
    }

    fn current(network: &Network, id: &str, kind: FaultKind) -> Option<f64> {
        let bus = network.bus_by_id(id).unwrap().index;
        let spec = FaultSpec {
            bus,
            kind,
            impedance_ohm: 0.0,
        };
        SequenceNetworkSolver::default()
            .solve(network, &spec, None)
            .unwrap()
            .currents_ka
            .get(&bus)
            .copied()
    }

    #[test]
    fn fault_at_source_bus_equals_source_short_circuit_current() {
        let network = radial();
        // S_sc / (sqrt(3) * Un) with Z0 = Z1 at the source.
        let expected = 1000.0 / (3.0f64.sqrt() * 20.0);
        let ik1 = current(&network, "A", FaultKind::SinglePhaseToGround).unwrap();
        let ik3 = current(&network, "A", FaultKind::ThreePhase).unwrap();
        assert!((ik1 - expected).abs() < 1e-6, "{ik1}");
        assert!((ik3 - expected).abs() < 1e-6, "{ik3}");
    }

    #[test]
    fn line_impedance_reduces_remote_current() {
        let network = radial();
        let at_a = current(&network, "A", FaultKind::SinglePhaseToGround).unwrap();
        let at_b = current(&network, "B", FaultKind::SinglePhaseToGround).unwrap();
        let at_b3 = current(&network, "B", FaultKind::ThreePhase).unwrap();
        assert!(at_b > 0.0 && at_b < at_a);
        // Zero-sequence line impedance is three times the positive one.
        assert!(at_b < at_b3);
    }

    #[test]
    fn component_without_source_has_no_result() {
        let network = radial();
        assert_eq!(current(&network, "C", FaultKind::SinglePhaseToGround), None);
    }

    #[test]
    fn expired_deadline_is_a_timeout() {
        let network = radial();
        let spec = FaultSpec::single_phase(network.bus_by_id("B").unwrap().index);
        let deadline = Instant::now() - Duration::from_millis(1);
        let result = SequenceNetworkSolver::default().solve(&network, &spec, Some(deadline));
        assert_eq!(result, Err(SolverError::Timeout));
    }

    #[test]
    fn session_clears_configuration_and_output() {
        let mut session = SolverSession::default();
        assert!(session.is_empty());
        session.configure(FaultSpec::single_phase(BusIdx(0)));
        let mut output = SolverOutput::default();
        output.currents_ka.insert(BusIdx(0), 1.5);
        session.store(output);
        assert_eq!(session.current_ka(BusIdx(0)), Some(1.5));
        session.clear();
        assert!(session.is_empty());
    }
}
