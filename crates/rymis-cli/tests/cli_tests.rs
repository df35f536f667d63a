//! End-to-end tests for the `rymis` binary.
//!
//! Each test writes a run file to a temporary directory and invokes the
//! compiled binary on it.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

fn rymis(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rymis"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch rymis")
}

fn run_file(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

fn json_stdout(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "rymis failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// default-config
// ============================================================================

#[test]
fn test_default_config_is_complete_yaml() {
    let output = rymis(&["default-config"]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    for key in ["lattice:", "ansatz:", "propagator:", "simulation:", "optimizer:"] {
        assert!(text.contains(key), "missing {key} in:\n{text}");
    }
    assert!(text.contains("method: nelder_mead"));
    assert!(text.contains("type: krylov"));
}

#[test]
fn test_default_config_is_accepted_back() {
    let output = rymis(&["default-config"]);
    let file = run_file(&String::from_utf8(output.stdout).unwrap());
    let path = file.path().to_str().unwrap();
    // Parsing succeeds; the lattice is then built and simulated.
    let report = json_stdout(&rymis(&["adiabatic", "--config", path, "--json"]));
    assert_eq!(report["atoms"], 9);
    assert_eq!(report["basis_dim"], 35);
}

// ============================================================================
// adiabatic
// ============================================================================

#[test]
fn test_adiabatic_krylov_on_square_plaquette() {
    // Four atoms all within the blockade radius: at most one can be excited.
    let file = run_file(
        "lattice:\n  rows: 2\n  cols: 2\npropagator:\n  type: krylov\n  segments: 200\n\
         top_k: 3\nshots: 50\n",
    );
    let path = file.path().to_str().unwrap();
    let report = json_stdout(&rymis(&["adiabatic", "-c", path, "--json"]));

    assert_eq!(report["atoms"], 4);
    assert_eq!(report["edges"], 6);
    assert_eq!(report["basis_dim"], 5);
    let occupation = report["expected_occupation"].as_f64().unwrap();
    assert!((0.0..=1.0 + 1e-9).contains(&occupation));

    let top = report["top"].as_array().unwrap();
    assert_eq!(top.len(), 3);
    for row in top {
        assert_eq!(row["independent"], true);
        assert_eq!(row["postprocessed_size"], 1);
    }
    assert_eq!(report["shots"]["shots"], 50);
    assert_eq!(report["shots"]["best_size"], 1);
}

#[test]
fn test_adiabatic_ode_full_space() {
    let file = run_file(
        "lattice:\n  rows: 1\n  cols: 3\nfull_space: true\npropagator:\n  type: ode\n",
    );
    let path = file.path().to_str().unwrap();
    let report = json_stdout(&rymis(&["adiabatic", "--config", path, "--json"]));
    assert_eq!(report["basis_dim"], 8);
    let densities = report["site_densities"].as_array().unwrap();
    assert_eq!(densities.len(), 3);
}

#[test]
fn test_adiabatic_table_output() {
    let file = run_file("lattice:\n  rows: 1\n  cols: 2\n");
    let path = file.path().to_str().unwrap();
    let output = rymis(&["adiabatic", "--config", path]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("Adiabatic sweep"));
    assert!(text.contains("Most probable configurations"));
}

// ============================================================================
// optimize
// ============================================================================

#[test]
fn test_optimize_never_worsens_the_start() {
    let file = run_file(
        "lattice:\n  rows: 1\n  cols: 2\n\
         ansatz:\n  omega_max: 15.7\n  ramp_time: 0.1\n  delta_start: -27\n  delta_end: 27\n  \
         n_interior: 1\n  duration: 1.0\n  shape:\n    type: linear\n\
         optimizer:\n  method: nelder_mead\n  max_iter: 3\n",
    );
    let path = file.path().to_str().unwrap();
    let report = json_stdout(&rymis(&["optimize", "--config", path, "--json"]));

    let initial = report["initial_loss"].as_f64().unwrap();
    let best = report["best_loss"].as_f64().unwrap();
    assert!(best <= initial);
    assert!(best >= -1.0 - 1e-9);
    assert_eq!(report["best_params"].as_array().unwrap().len(), 1);
    assert_eq!(report["solution_size"], 1);
}

// ============================================================================
// Error paths
// ============================================================================

#[test]
fn test_missing_run_file() {
    let output = rymis(&["adiabatic", "--config", "/nonexistent/run.yaml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read run file"));
}

#[test]
fn test_invalid_run_file() {
    let file = run_file("simulation:\n  ode:\n    atol: -1.0\n");
    let path = file.path().to_str().unwrap();
    let output = rymis(&["adiabatic", "--config", path]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid run file"));
}

#[test]
fn test_missing_config_argument() {
    assert!(!rymis(&["adiabatic"]).status.success());
}

#[test]
fn test_unknown_subcommand() {
    assert!(!rymis(&["foobar"]).status.success());
}

#[test]
fn test_verbose_flags_accepted() {
    assert!(rymis(&["-vv", "default-config"]).status.success());
    assert!(rymis(&["default-config", "-v"]).status.success());
}
