//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Command line behaviour tests for gridfaultctl."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;

use assert_cmd::Command;
use tempfile::tempdir;

const DATASET: &str = r#"{
  "nodes": [
    {"id": "1", "x": 0.0, "y": 0.0},
    {"id": "2", "x": 300.0, "y": 0.0}
  ],
  "lines": [
    {"id": "L1", "from_id": 1, "to_id": "2.0", "length_m": "300",
     "r_ohm_per_km": "0,206", "x_ohm_per_km": "0,12",
     "material": "KABEL 150MM2 SN", "i_max_a": 320}
  ],
  "substations": [{"id": "S1", "x": 1.0, "y": 1.0}]
}"#;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("gridfaultctl").unwrap();
    cmd.env_remove("GRIDFAULT_CONFIG");
    cmd
}

#[test]
fn build_prints_summary() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("grid.json");
    fs::write(&input, DATASET).unwrap();

    let output = cmd()
        .args(["build", "--input"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Buses: 2"));
    assert!(stdout.contains("Lines: 1"));
    assert!(stdout.contains("Sources: 1"));
}

#[test]
fn fault_writes_json_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("grid.json");
    fs::write(&input, DATASET).unwrap();
    let out = dir.path().join("out");

    let output = cmd()
        .args(["fault", "--line", "L1", "--json", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["fault_bus_id"], "1");
    assert!(report["fault_current_ka"].as_f64().unwrap() > 0.0);
    assert!(out.join("fault_report.json").exists());
}

#[test]
fn unknown_line_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("grid.json");
    fs::write(&input, DATASET).unwrap();

    let output = cmd()
        .args(["fault", "--line", "missing", "--input"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("target missing not in network"));
}

#[test]
fn capacitance_classifies_descriptors() {
    let output = cmd()
        .args(["capacitance", "--material", "goli vodnik 70 mm2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("BareConductor"));
    assert!(stdout.contains("70"));
}
