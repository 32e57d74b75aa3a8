//! Deck to engine output to baselines, through the libraries and the binaries.

use approx::assert_relative_eq;
use ndarray::{arr0, arr1};
use picdeck_config::{Deck, SimulationConfig};
use picdeck_core::DiagnosticKind;
use picdeck_storage::{BaselineStore, ResultArchive};
use picdeck_validate::{
    FailureReason, Harness, HarnessConfig, Outcome, load_cases, open_result_store,
};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use uuid::Uuid;

const DECK: &str = r#"{
    "simulation": {
        "geometry": "1Dcartesian",
        "grid": [{"cell_length": 6.28, "grid_length": 251.2}],
        "timestep": 1.57,
        "simulation_time": 31400,
        "EM_boundary_conditions": [["periodic"]],
        "random_seed": 0
    },
    "species": [
        {"name": "electron", "mass": 1.0, "charge": -1.0, "number_density": 1.0,
         "mean_velocity": [0.1, 0.0, 0.0], "particles_per_cell": 4},
        {"name": "ion", "mass": 1836.0, "charge": 1.0, "number_density": 1.0}
    ],
    "interactions": [
        {"species1": ["electron"], "species2": ["ion"], "coulomb_log": 2.0}
    ],
    "diagnostics": [
        {"every": 100, "kind": "scalar"},
        {"every": 100, "kind": "particle-binning", "deposited_quantity": "weight",
         "species": ["electron"], "axes": [{"quantity": "x", "min": 0.0, "max": 251.2, "bins": 4}]},
        {"every": 100, "kind": "particle-binning", "deposited_quantity": "weight_px",
         "species": ["electron"], "axes": [{"quantity": "x", "min": 0.0, "max": 251.2, "bins": 4}]},
        {"every": 100, "kind": "track-particles", "species": "electron", "filter": "x < 50"}
    ]
}"#;

const CASES: &str = r#"[
    {"label": "Kinetic energy", "selector": {"kind": "scalar", "quantity": "Ukin"},
     "tolerance": {"value": 1e-10, "kind": "relative"}},
    {"label": "Weight distribution",
     "selector": {"kind": "particle-binning", "index": 0, "timesteps": {"at": 20000}},
     "tolerance": {"value": 1e-7, "kind": "absolute"}},
    {"label": "Total momentum",
     "selector": {"kind": "particle-binning", "index": 1,
                  "timesteps": {"range": {"start": 0, "end": 20000}},
                  "slice": [{"axis": "x", "op": "all"}]}},
    {"label": "Tracked px", "selector": {"kind": "track-particles", "quantity": "px"},
     "tolerance": {"value": 1e-12, "kind": "absolute"}},
    {"label": "Timesteps", "selector": {"kind": "scalar", "output": "timesteps"}}
]"#;

const STEPS: [u64; 3] = [0, 10000, 20000];

fn config() -> SimulationConfig {
    Deck::from_json(DECK).unwrap().build().unwrap()
}

/// Stand-in for the engine: writes one frame per diagnostic per step.
/// `drift` perturbs the last weight histogram.
fn write_run(dir: &Path, config: &SimulationConfig, drift: f64, completed: bool) -> Uuid {
    let run_id = Uuid::new_v4();
    let mut archive = ResultArchive::new(run_id);

    for diagnostic in config.diagnostics() {
        let key = diagnostic.key;
        for &t in &STEPS {
            let phase = t as f64 / 20000.0;
            match key.kind {
                DiagnosticKind::Scalar => {
                    archive.push_array(key, t, "Ukin", arr0(0.005 * (1.0 - 0.1 * phase)).into_dyn());
                    archive.push_array(key, t, "Utot", arr0(0.005).into_dyn());
                }
                DiagnosticKind::ParticleBinning => {
                    archive.record_mut(key, &["x"]);
                    let mut weights = arr1(&[0.25, 0.25, 0.25, 0.25]) * (1.0 + key.index as f64 * phase);
                    if key.index == 0 && t == 20000 {
                        weights[2] += drift;
                    }
                    archive.push_array(key, t, "values", weights.into_dyn());
                }
                DiagnosticKind::TrackParticles => {
                    archive.push_array(key, t, "id", arr1(&[1.0, 2.0, 3.0]).into_dyn());
                    archive.push_array(key, t, "x", arr1(&[10.0, 100.0, 30.0 + phase]).into_dyn());
                    archive.push_array(key, t, "px", arr1(&[0.1, 0.1, 0.2 - 0.1 * phase]).into_dyn());
                }
                DiagnosticKind::Fields => {}
            }
        }
    }
    if completed {
        archive.mark_completed();
    }
    archive.save(dir).unwrap();
    run_id
}

#[test]
fn reference_deck_finalizes() {
    let config = config();
    let derived = config.derived();
    assert_eq!(derived.cells_per_axis, vec![40]);
    assert_eq!(derived.n_timesteps, 20000);
    assert_relative_eq!(derived.cfl_timestep, 6.28, max_relative = 1e-12);
    assert!(config.warnings().is_empty());
    assert_eq!(config.diagnostics()[2].key.index, 1);
}

#[test]
fn baselines_recorded_then_checked() {
    let dir = TempDir::new().unwrap();
    let run = dir.path().join("collisions1d");
    fs::create_dir_all(&run).unwrap();
    let config = config();
    let first_run = write_run(&run, &config, 0.0, true);
    fs::write(run.join("cases.json"), CASES).unwrap();

    let cases = load_cases(&run.join("cases.json")).unwrap();
    let baseline_file = dir.path().join("references").join("collisions1d.bin");
    let store = open_result_store(&run).unwrap();

    let mut harness = Harness::new(
        BaselineStore::open(&baseline_file).unwrap(),
        HarnessConfig::default(),
    );
    let report = harness.run_suite(&store, &cases);
    assert_eq!(report.new_baselines(), 5, "{report}");
    assert!(report.is_success());

    let report = harness.run_suite(&store, &cases);
    assert_eq!(report.passed(), 5, "{report}");

    // a fresh run with drift in one bin, checked by a fresh harness
    write_run(&run, &config, 1e-3, true);
    let store = open_result_store(&run).unwrap();
    let baselines = BaselineStore::open(&baseline_file).unwrap();
    assert_eq!(baselines.get("Tracked px").unwrap().run_id, Some(first_run));

    let report = Harness::new(baselines, HarnessConfig::default()).run_suite(&store, &cases);
    assert_eq!(report.failed(), 1, "{report}");
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.label, "Weight distribution");
    let Outcome::Fail(FailureReason::Deviation(worst)) = &failure.outcome else {
        panic!("unexpected outcome {:?}", failure.outcome);
    };
    assert_eq!(worst.index, vec![2]);
    assert_relative_eq!(worst.deviation, 1e-3, max_relative = 1e-9);
}

#[test]
fn tracked_particles_follow_the_filter() {
    let dir = TempDir::new().unwrap();
    let config = config();
    write_run(dir.path(), &config, 0.0, true);
    let store = open_result_store(dir.path()).unwrap();

    let case: picdeck_validate::ValidationCase = serde_json::from_str(
        r#"{"label": "px", "selector": {"kind": "track-particles", "quantity": "px",
            "filter": "x < 50", "filter_at": 0}}"#,
    )
    .unwrap();
    let series = picdeck_validate::extract_series(&store, &case.selector).unwrap();
    assert_eq!(series.shape(), &[3, 2]);
    assert_relative_eq!(series[[2, 1]], 0.1, max_relative = 1e-12);
}

fn run_validation(args: &[&str]) -> (i32, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_run-validation"))
        .args(args)
        .output()
        .unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
}

#[test]
fn run_validation_exit_codes() {
    let dir = TempDir::new().unwrap();
    let run = dir.path().join("run");
    fs::create_dir_all(&run).unwrap();
    let config = config();
    write_run(&run, &config, 0.0, true);
    fs::write(run.join("cases.json"), CASES).unwrap();

    let run_arg = run.to_str().unwrap();
    let baselines = dir.path().join("refs.bin");
    let baseline_arg = baselines.to_str().unwrap();

    let (code, stdout) = run_validation(&[run_arg, "--baseline-file", baseline_arg]);
    assert_eq!(code, 0, "{stdout}");
    assert!(stdout.contains("0 passed, 0 failed, 5 new baselines"));

    let (code, stdout) = run_validation(&[run_arg, "--baseline-file", baseline_arg]);
    assert_eq!(code, 0, "{stdout}");
    assert!(stdout.contains("5 passed"));

    write_run(&run, &config, 1e-3, true);
    let (code, stdout) = run_validation(&[run_arg, "--baseline-file", baseline_arg]);
    assert_eq!(code, 1, "{stdout}");
    assert!(stdout.contains("FAIL  Weight distribution"));

    // accepting the drift makes the next comparison clean
    let (code, _) = run_validation(&[run_arg, "--baseline-file", baseline_arg, "--update-baselines"]);
    assert_eq!(code, 0);
    let (code, _) = run_validation(&[run_arg, "--baseline-file", baseline_arg]);
    assert_eq!(code, 0);
}

#[test]
fn run_validation_refuses_unusable_stores() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nothing-here");
    let (code, _) = run_validation(&[missing.to_str().unwrap()]);
    assert_eq!(code, 2);

    let config = config();
    write_run(dir.path(), &config, 0.0, false);
    fs::write(dir.path().join("cases.json"), CASES).unwrap();
    let (code, _) = run_validation(&[dir.path().to_str().unwrap()]);
    assert_eq!(code, 2);
}

#[test]
fn picdeck_checks_and_emits_decks() {
    let dir = TempDir::new().unwrap();
    let deck = dir.path().join("deck.json");
    let emitted = dir.path().join("engine.json");
    fs::write(&deck, DECK).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_picdeck"))
        .arg(&deck)
        .arg("--emit")
        .arg(&emitted)
        .status()
        .unwrap();
    assert!(status.success());
    let engine_input: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&emitted).unwrap()).unwrap();
    assert!(engine_input.get("species").is_some());

    let ambiguous = DECK.replace(
        r#""number_density": 1.0,
         "mean_velocity""#,
        r#""number_density": 1.0, "charge_density": 1e-9,
         "mean_velocity""#,
    );
    assert_ne!(ambiguous, DECK);
    fs::write(&deck, ambiguous).unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_picdeck"))
        .arg(&deck)
        .status()
        .unwrap();
    assert!(!status.success());
}
