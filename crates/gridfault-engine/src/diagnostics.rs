//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Construction diagnostics. Problems found while assembling a network are
//! collected here instead of aborting the build.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Bus,
    Line,
    Load,
    Substation,
    Transformer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Mapping,
    Parse,
    Duplicate,
}

/// What happened to the element that raised the issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Skipped,
    Defaulted,
    Remapped,
    /// Kept under a generated id because its own id was taken.
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum BuildIssue {
    #[error("invalid identifier in field {field} (raw value {raw})")]
    InvalidIdentifier { field: &'static str, raw: String },
    #[error("malformed {field} value {raw:?}")]
    MalformedField { field: &'static str, raw: String },
    #[error("endpoint not in bus map ({from}, {to})")]
    UnmappedEndpoints { from: String, to: String },
    #[error("node {node} not found in bus map")]
    UnmappedNode { node: String },
    #[error("substation {substation} has no registered source")]
    UnmappedSubstation { substation: String },
    #[error("no bus with coordinates available near substation {substation}")]
    NoCandidateBus { substation: String },
    #[error("bus {id} already exists with different data")]
    DuplicateBus { id: String },
    #[error("line id {id} already taken, kept as {renamed}")]
    DuplicateLine { id: String, renamed: String },
    #[error("substation {substation} already registered as a source")]
    DuplicateSubstation { substation: String },
    #[error("metering point {metering_point} remapped to a later load")]
    DuplicateMeteringPoint { metering_point: String },
    #[error("transformer parameters fell back to representative values: {reason}")]
    DefaultedParameters { reason: String },
}

impl BuildIssue {
    pub fn class(&self) -> ErrorClass {
        match self {
            BuildIssue::UnmappedEndpoints { .. }
            | BuildIssue::UnmappedNode { .. }
            | BuildIssue::UnmappedSubstation { .. }
            | BuildIssue::NoCandidateBus { .. } => ErrorClass::Mapping,
            BuildIssue::InvalidIdentifier { .. }
            | BuildIssue::MalformedField { .. }
            | BuildIssue::DefaultedParameters { .. } => ErrorClass::Parse,
            BuildIssue::DuplicateBus { .. }
            | BuildIssue::DuplicateLine { .. }
            | BuildIssue::DuplicateSubstation { .. }
            | BuildIssue::DuplicateMeteringPoint { .. } => ErrorClass::Duplicate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildDiagnostic {
    pub element: ElementKind,
    /// Zero-based index of the offending row in its input table.
    pub row: usize,
    pub class: ErrorClass,
    pub outcome: Outcome,
    #[serde(flatten)]
    pub issue: BuildIssue,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<BuildDiagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, element: ElementKind, row: usize, issue: BuildIssue, outcome: Outcome) {
        let message = issue.to_string();
        warn!(
            element = ?element,
            row,
            class = ?issue.class(),
            outcome = ?outcome,
            "{}",
            message
        );
        self.entries.push(BuildDiagnostic {
            element,
            row,
            class: issue.class(),
            outcome,
            issue,
            message,
        });
    }

    pub fn skip(&mut self, element: ElementKind, row: usize, issue: BuildIssue) {
        self.record(element, row, issue, Outcome::Skipped);
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildDiagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_element(&self, element: ElementKind) -> impl Iterator<Item = &BuildDiagnostic> {
        self.entries.iter().filter(move |d| d.element == element)
    }

    pub fn skipped(&self, element: ElementKind) -> usize {
        self.for_element(element)
            .filter(|d| d.outcome == Outcome::Skipped)
            .count()
    }
}
