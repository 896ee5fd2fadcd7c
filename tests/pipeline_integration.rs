//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Integration and validation tests for the GridFault stack."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::thread;

use gridfault_common::EngineConfig;
use gridfault_engine::{
    build_from_path, reports, BuildOutcome, ElementKind, ErrorClass, FaultEvaluator, FaultKind,
    FaultTarget, Outcome, ReportExporter, SimulationError,
};
use once_cell::sync::Lazy;

fn workspace_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(relative)
}

static CONFIG: Lazy<EngineConfig> = Lazy::new(|| {
    let config = EngineConfig::from_path(&workspace_path("configs/gridfault.toml"))
        .unwrap_or_else(|err| panic!("example configuration should parse: {err:#}"));
    config.validate().expect("example configuration is valid");
    config
});

fn sample_feeder() -> BuildOutcome {
    build_from_path(&workspace_path("fixtures/sample_feeder"), &CONFIG)
        .expect("sample feeder loads")
}

#[test]
fn sample_feeder_builds_with_expected_diagnostics() {
    let outcome = sample_feeder();
    let summary = outcome.network.summary();
    assert_eq!(summary.buses, 7);
    assert_eq!(summary.lines, 5);
    assert_eq!(summary.sources, 1);
    assert_eq!(summary.transformers, 2);
    assert_eq!(summary.loads, 4);

    let diagnostics = &outcome.diagnostics;
    assert_eq!(diagnostics.skipped(ElementKind::Bus), 1);
    assert_eq!(diagnostics.skipped(ElementKind::Line), 2);
    assert_eq!(diagnostics.skipped(ElementKind::Substation), 1);
    assert_eq!(diagnostics.skipped(ElementKind::Transformer), 1);
    assert_eq!(diagnostics.skipped(ElementKind::Load), 1);
    assert_eq!(diagnostics.len(), 8);

    let line_classes: Vec<_> = diagnostics
        .for_element(ElementKind::Line)
        .map(|d| d.class)
        .collect();
    assert_eq!(line_classes, vec![ErrorClass::Mapping, ErrorClass::Parse]);
    assert!(diagnostics
        .for_element(ElementKind::Load)
        .any(|d| d.outcome == Outcome::Remapped));

    let source = outcome.network.source_for_substation("RTP-12").unwrap();
    assert_eq!(outcome.network.bus(source.bus).id, "5001");

    let brdo = outcome
        .network
        .transformers()
        .iter()
        .find(|t| t.name == "TP Brdo")
        .unwrap();
    assert!(brdo.defaulted);
    assert_eq!(brdo.params.sn_mva, 20.0);
}

#[test]
fn repeated_metering_point_binds_to_latest_load() {
    let mut outcome = sample_feeder();
    let network = &mut outcome.network;
    let load = network.load_for_metering_point("2-100-1").unwrap();
    assert_eq!(network.bus(load.bus).id, "5006");

    assert!(network.assign_load_power("2-100-1", 0.012, 0.004));
    assert_eq!(network.loads()[0].p_mw, 0.0);
    assert_eq!(network.loads()[3].p_mw, 0.012);
}

#[test]
fn faults_are_evaluated_at_line_from_bus() {
    let outcome = sample_feeder();
    let evaluator = FaultEvaluator::from_config(&CONFIG.solver);

    let at_source = evaluator
        .evaluate(&outcome.network, &FaultTarget::line("SN-01"))
        .unwrap();
    assert_eq!(at_source.fault_bus_id, "5001");

    let remote = evaluator
        .evaluate(&outcome.network, &FaultTarget::line("SN-05"))
        .unwrap();
    assert_eq!(remote.fault_bus_id, "5004");
    assert!(remote.fault_current_ka > 0.0);

    let at_brdo = evaluator
        .evaluate(&outcome.network, &FaultTarget::bus("5006"))
        .unwrap();
    assert!(at_source.fault_current_ka > at_brdo.fault_current_ka);

    let three_phase = evaluator
        .evaluate_kind(&outcome.network, &FaultTarget::line("SN-01"), FaultKind::ThreePhase)
        .unwrap();
    // S_sc / (sqrt(3) * Un) at the feed-in bus.
    assert_eq!(three_phase.fault_current_ka, 28.87);
    assert!(outcome.network.solver_idle());
}

#[test]
fn isolated_and_unknown_targets_fail_cleanly() {
    let outcome = sample_feeder();
    let evaluator = FaultEvaluator::from_config(&CONFIG.solver);

    let err = evaluator
        .evaluate(&outcome.network, &FaultTarget::bus("5007"))
        .unwrap_err();
    assert_eq!(err, SimulationError::NoResult { bus: "5007".into() });

    let err = evaluator
        .evaluate(&outcome.network, &FaultTarget::line("SN-06"))
        .unwrap_err();
    assert!(matches!(err, SimulationError::TargetNotInNetwork { .. }));
    assert!(outcome.network.solver_idle());
}

#[test]
fn concurrent_evaluations_match_sequential_results() {
    let outcome = sample_feeder();
    let network = &outcome.network;
    let evaluator = FaultEvaluator::from_config(&CONFIG.solver);
    let targets = ["SN-01", "SN-02", "SN-03", "SN-04", "SN-05"];

    let expected: Vec<_> = targets
        .iter()
        .map(|id| evaluator.evaluate(network, &FaultTarget::line(*id)).unwrap())
        .collect();

    thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|id| {
                let evaluator = &evaluator;
                scope.spawn(move || {
                    (0..10)
                        .map(|_| evaluator.evaluate(network, &FaultTarget::line(*id)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for (handle, expected) in handles.into_iter().zip(&expected) {
            for report in handle.join().unwrap() {
                assert_eq!(&report, expected);
            }
        }
    });
    assert!(network.solver_idle());
}

#[test]
fn reports_land_in_output_directory() {
    let outcome = sample_feeder();
    let report = FaultEvaluator::from_config(&CONFIG.solver)
        .evaluate(&outcome.network, &FaultTarget::line("SN-03"))
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    ReportExporter::new(&outcome.network, &outcome.diagnostics)
        .export_all(dir.path(), Some(&report))
        .unwrap();

    let diagnostics: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(reports::DIAGNOSTICS_REPORT)).unwrap(),
    )
    .unwrap();
    assert_eq!(diagnostics["data"].as_array().unwrap().len(), 8);

    let table = std::fs::read_to_string(dir.path().join(reports::CAPACITANCE_TABLE)).unwrap();
    // Cable 150 mm2 (medium), bare 50 mm2 (medium) and bare 35 mm2 (low).
    assert_eq!(table.lines().count(), 4);
}
