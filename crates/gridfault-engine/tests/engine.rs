//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use gridfault_common::config::EngineConfig;
use gridfault_engine::{
    analyze_fault, build_from_path, reports, ElementKind, EngineError, ErrorClass, FaultTarget,
    Outcome, SimulationError,
};
use tempfile::tempdir;

fn write_feeder(dir: &Path) {
    fs::write(
        dir.join("nodes.csv"),
        "id,x,y\n\
         100,0,0\n\
         101,250,0\n\
         102.0,500,0\n\
         103 ,750,0\n\
         200,0,900\n",
    )
    .unwrap();
    fs::write(
        dir.join("lines.csv"),
        "id,from_id,to_id,length_m,r_ohm_per_km,x_ohm_per_km,material,i_max_a\n\
         L1,100,101,250,\"0,206\",\"0,12\",KABEL NA2XS2Y 150MM2 SN,320\n\
         L2,101,102,250,\"0,443\",\"0,35\",GOLI VODNIK 50 MM2,170\n\
         L3,102,103,250,\"0,443\",\"0,35\",GOLI VODNIK 50 MM2,170\n\
         L4,103,999,80,\"0,443\",\"0,35\",,170\n",
    )
    .unwrap();
    fs::write(
        dir.join("substations.csv"),
        "id,x,y,name\nRTP-7,5,-3,RTP Center\n",
    )
    .unwrap();
    fs::write(
        dir.join("transformers.csv"),
        "name,lv_node_id,substation_id,rated_power_va,u_primary_v,u_secondary_v,p_cu_kw,p_fe_kw,i0_percent\n\
         TP-1,103,RTP-7,630000,20000,420,\"6,5\",\"0,93\",\"0,3\"\n\
         TP-2,101,RTP-7,n/a,20000,420,1,1,1\n",
    )
    .unwrap();
    fs::write(
        dir.join("loads.csv"),
        "node_id,metering_point_id\n103,MM-1\n200,MM-2\n",
    )
    .unwrap();
}

#[test]
fn builds_feeder_from_csv_tables() {
    let dir = tempdir().unwrap();
    write_feeder(dir.path());

    let outcome = build_from_path(dir.path(), &EngineConfig::default()).unwrap();
    let summary = outcome.network.summary();
    assert_eq!(summary.buses, 5);
    assert_eq!(summary.lines, 3);
    assert_eq!(summary.sources, 1);
    assert_eq!(summary.transformers, 2);
    assert_eq!(summary.loads, 2);

    let source = outcome.network.source_for_substation("RTP-7").unwrap();
    assert_eq!(outcome.network.bus(source.bus).id, "100");
    assert_eq!(source.name, "RTP Center");
    assert!(outcome.network.bus_by_id("102").is_some());
    assert!(outcome.network.bus_by_id("103").is_some());

    let dropped: Vec<_> = outcome
        .diagnostics
        .for_element(ElementKind::Line)
        .collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].class, ErrorClass::Mapping);
    assert!(outcome.network.transformers()[1].defaulted);
}

#[test]
fn analyzes_fault_and_writes_reports() {
    let dir = tempdir().unwrap();
    write_feeder(dir.path());
    let out = dir.path().join("reports");

    let report = analyze_fault(
        dir.path(),
        &FaultTarget::line("L3"),
        &EngineConfig::default(),
        &out,
    )
    .unwrap();
    assert_eq!(report.fault_bus_id, "102");
    assert_eq!(report.line_id.as_deref(), Some("L3"));
    assert!(report.fault_current_ka > 0.0);

    for name in [
        reports::SUMMARY_REPORT,
        reports::DIAGNOSTICS_REPORT,
        reports::FAULT_REPORT,
        reports::CAPACITANCE_TABLE,
    ] {
        assert!(out.join(name).exists(), "{name} missing");
    }
}

#[test]
fn unknown_line_is_a_simulation_error() {
    let dir = tempdir().unwrap();
    write_feeder(dir.path());

    let err = analyze_fault(
        dir.path(),
        &FaultTarget::line("L9"),
        &EngineConfig::default(),
        &dir.path().join("reports"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Simulation(SimulationError::TargetNotInNetwork { .. })
    ));
    assert!(dir.path().join("reports").join(reports::SUMMARY_REPORT).exists());
}

#[test]
fn odd_coordinate_cells_do_not_abort_loading() {
    let dir = tempdir().unwrap();
    write_feeder(dir.path());
    fs::write(
        dir.path().join("nodes.csv"),
        "id,x,y\n\
         100,0,0\n\
         101,\"250,5\",0\n\
         102.0,500,0\n\
         103 ,,\n\
         200,0,900\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("substations.csv"),
        "id,x,y,name\n\
         RTP-7,5,-3,RTP Center\n\
         RTP-8,,,Unplaced\n\
         RTP-9,NaN,0,Broken\n",
    )
    .unwrap();

    let outcome = build_from_path(dir.path(), &EngineConfig::default()).unwrap();
    let network = &outcome.network;
    assert_eq!(network.summary().buses, 5);
    assert_eq!(network.summary().sources, 1);
    assert_eq!(
        network.bus_by_id("101").and_then(|bus| bus.coordinate).map(|p| p.x),
        Some(250.5)
    );
    assert!(network.bus_by_id("103").unwrap().coordinate.is_none());

    let substations: Vec<_> = outcome
        .diagnostics
        .for_element(ElementKind::Substation)
        .map(|d| (d.row, d.class, d.outcome))
        .collect();
    assert_eq!(
        substations,
        vec![
            (1, ErrorClass::Parse, Outcome::Skipped),
            (2, ErrorClass::Parse, Outcome::Skipped),
        ]
    );
}
