//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Fault target selection and single-fault evaluation against a built network.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use gridfault_common::config::SolverConfig;
use parking_lot::MutexGuard;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    errors::SimulationError,
    ident::normalize_str,
    model::{BusIdx, Network},
    solver::{FaultKind, FaultSpec, SequenceNetworkSolver, ShortCircuitSolver, SolverSession},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultTarget {
    Line {
        id: String,
    },
    Bus {
        id: String,
    },
    /// A clicked map position. The label, when present, names the line under the cursor.
    Point {
        x: f64,
        y: f64,
        #[serde(default)]
        label: Option<String>,
    },
}

impl FaultTarget {
    pub fn line(id: impl Into<String>) -> Self {
        FaultTarget::Line { id: id.into() }
    }

    pub fn bus(id: impl Into<String>) -> Self {
        FaultTarget::Bus { id: id.into() }
    }
}

impl fmt::Display for FaultTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultTarget::Line { id } => write!(f, "line {id}"),
            FaultTarget::Bus { id } => write!(f, "bus {id}"),
            FaultTarget::Point { x, y, label } => match label {
                Some(label) => write!(f, "point ({x}, {y}) on {label}"),
                None => write!(f, "point ({x}, {y})"),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum LocatorState {
    #[default]
    Idle,
    Located(FaultTarget),
}

/// Holds at most one selected fault target. A new selection replaces the old one.
#[derive(Debug, Clone, Default)]
pub struct FaultLocator {
    state: LocatorState,
}

impl FaultLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, target: FaultTarget) -> Result<&FaultTarget, SimulationError> {
        let located = match target {
            FaultTarget::Point {
                label: Some(label), ..
            } => FaultTarget::Line { id: label },
            FaultTarget::Point { label: None, .. } => {
                self.state = LocatorState::Idle;
                return Err(SimulationError::TargetNotFound);
            }
            explicit => explicit,
        };
        self.state = LocatorState::Located(located);
        let LocatorState::Located(target) = &self.state else {
            unreachable!("locator state assigned above");
        };
        Ok(target)
    }

    pub fn reset(&mut self) {
        self.state = LocatorState::Idle;
    }

    pub fn state(&self) -> &LocatorState {
        &self.state
    }

    pub fn target(&self) -> Option<&FaultTarget> {
        match &self.state {
            LocatorState::Located(target) => Some(target),
            LocatorState::Idle => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultReport {
    pub fault_bus_id: String,
    pub line_id: Option<String>,
    pub fault_kind: FaultKind,
    /// Initial short-circuit current, rounded to two decimals.
    pub fault_current_ka: f64,
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fault at bus {}",
            self.fault_kind, self.fault_bus_id
        )?;
        if let Some(line) = &self.line_id {
            write!(f, " (line {line})")?;
        }
        write!(f, ": {:.2} kA", self.fault_current_ka)
    }
}

/// Clears the session however the evaluation exits.
struct SessionGuard<'a>(MutexGuard<'a, SolverSession>);

impl Deref for SessionGuard<'_> {
    type Target = SolverSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

#[derive(Debug, Clone)]
pub struct FaultEvaluator<S = SequenceNetworkSolver> {
    solver: S,
    timeout: Option<Duration>,
}

impl FaultEvaluator<SequenceNetworkSolver> {
    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(SequenceNetworkSolver::new(config.clone()), config.timeout)
    }
}

impl Default for FaultEvaluator<SequenceNetworkSolver> {
    fn default() -> Self {
        Self::from_config(&SolverConfig::default())
    }
}

impl<S: ShortCircuitSolver> FaultEvaluator<S> {
    pub fn new(solver: S, timeout: Option<Duration>) -> Self {
        Self { solver, timeout }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Evaluate whatever the locator currently points at.
    pub fn evaluate_selected(
        &self,
        network: &Network,
        locator: &FaultLocator,
    ) -> Result<FaultReport, SimulationError> {
        let target = locator.target().ok_or(SimulationError::NoTargetSelected)?;
        self.evaluate(network, target)
    }

    /// Bolted single-phase-to-ground fault at the target's bus.
    pub fn evaluate(
        &self,
        network: &Network,
        target: &FaultTarget,
    ) -> Result<FaultReport, SimulationError> {
        self.evaluate_kind(network, target, FaultKind::SinglePhaseToGround)
    }

    pub fn evaluate_kind(
        &self,
        network: &Network,
        target: &FaultTarget,
        kind: FaultKind,
    ) -> Result<FaultReport, SimulationError> {
        let (bus, line_id) = resolve(network, target)?;
        let fault_bus_id = network.bus(bus).id.clone();
        let spec = FaultSpec {
            bus,
            kind,
            impedance_ohm: 0.0,
        };

        let mut session = SessionGuard(network.session.lock());
        session.configure(spec);
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        match self.solver.solve(network, &spec, deadline) {
            Ok(output) => session.store(output),
            Err(err) => {
                warn!(bus = %fault_bus_id, error = %err, "short-circuit solver failed");
                return Err(SimulationError::NoResult { bus: fault_bus_id });
            }
        }
        let current = session
            .current_ka(bus)
            .filter(|value| value.is_finite())
            .ok_or_else(|| SimulationError::NoResult {
                bus: fault_bus_id.clone(),
            })?;

        let report = FaultReport {
            fault_bus_id,
            line_id,
            fault_kind: kind,
            fault_current_ka: (current * 100.0).round() / 100.0,
        };
        info!(%target, "{}", report);
        Ok(report)
    }
}

fn resolve(
    network: &Network,
    target: &FaultTarget,
) -> Result<(BusIdx, Option<String>), SimulationError> {
    let not_found = |id: &str| SimulationError::TargetNotInNetwork {
        target: id.to_string(),
    };
    match target {
        FaultTarget::Line { id } | FaultTarget::Point { label: Some(id), .. } => {
            let line = normalize_str(id)
                .as_key()
                .and_then(|key| network.line_by_id(key))
                .ok_or_else(|| not_found(id))?;
            Ok((line.from_bus, Some(line.id.clone())))
        }
        FaultTarget::Bus { id } => {
            let bus = normalize_str(id)
                .as_key()
                .and_then(|key| network.bus_by_id(key))
                .ok_or_else(|| not_found(id))?;
            Ok((bus.index, None))
        }
        FaultTarget::Point { label: None, .. } => Err(SimulationError::TargetNotFound),
    }
}
