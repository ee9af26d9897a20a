//! End-to-end properties of the sequential (`--local`) execution mode:
//! checkpointed re-entry, soft-failure short-circuit, and per-unit fatal
//! containment, all observed through the marker layout and the stub tools'
//! invocation logs.

mod common;

use common::{assert_success, fixture, invocation_count, run_pflow};
use std::fs;

#[test]
fn local_run_completes_every_stage_for_all_units() {
    let fx = fixture();
    let stubs = fx.default_stubs(&["p1", "p2"]);
    let mut args = fx.run_args(&stubs, 5, 2);
    args.push("--local".to_string());

    let output = run_pflow(&args);
    assert_success(&output);

    for patient in ["p1", "p2"] {
        let unit = fx.unit_dir(patient);
        assert!(unit.join(".resample_complete").is_file());
        for replicate in 1..=5 {
            assert!(
                unit.join(".reconstruct")
                    .join(format!("replicate_{replicate}"))
                    .is_file(),
                "missing replicate marker {replicate} for {patient}"
            );
        }
        assert!(unit.join(".aggregate_complete").is_file());
        assert!(unit.join(".select_complete").is_file());
        assert!(!unit.join(".no_signal").exists());
    }

    let manifest = fs::read_to_string(fx.root.join("units.txt")).expect("read manifest");
    assert_eq!(manifest.lines().count(), 2);

    let history = fs::read_to_string(fx.root.join("history.jsonl")).expect("read history");
    assert_eq!(history.lines().count(), 1);
    assert!(history.contains("\"mode\":\"local\""));
    assert!(history.contains("\"success\":true"));
}

#[test]
fn rerun_skips_completed_work_entirely() {
    let fx = fixture();
    let stubs = fx.default_stubs(&["p1"]);
    let mut args = fx.run_args(&stubs, 3, 2);
    args.push("--local".to_string());

    assert_success(&run_pflow(&args));
    let first = [
        invocation_count(&fx.log("preprocess")),
        invocation_count(&fx.log("resample")),
        invocation_count(&fx.log("reconstruct")),
        invocation_count(&fx.log("aggregate")),
        invocation_count(&fx.log("select")),
    ];
    assert_eq!(first, [1, 1, 3, 1, 1]);

    assert_success(&run_pflow(&args));
    let second = [
        invocation_count(&fx.log("preprocess")),
        invocation_count(&fx.log("resample")),
        invocation_count(&fx.log("reconstruct")),
        invocation_count(&fx.log("aggregate")),
        invocation_count(&fx.log("select")),
    ];
    assert_eq!(second, first, "second run must not re-invoke any step");
}

#[test]
fn soft_failure_short_circuits_the_unit_successfully() {
    let fx = fixture();
    let mut stubs = fx.default_stubs(&["p1"]);
    stubs.reconstruct =
        fx.stub_reconstruct("case \"$ssm\" in */bootstrap_3/*) exit 1 ;; esac");
    let mut args = fx.run_args(&stubs, 5, 2);
    args.push("--local".to_string());

    let output = run_pflow(&args);
    assert_success(&output);

    let unit = fx.unit_dir("p1");
    assert!(unit.join(".no_signal").is_file());
    for replicate in [1u32, 2, 4, 5] {
        assert!(unit
            .join(".reconstruct")
            .join(format!("replicate_{replicate}"))
            .is_file());
    }
    assert!(!unit.join(".reconstruct").join("replicate_3").exists());

    // Later stages were never invoked for the soft-stopped unit.
    assert_eq!(invocation_count(&fx.log("aggregate")), 0);
    assert_eq!(invocation_count(&fx.log("select")), 0);
    assert!(!unit.join(".aggregate_complete").exists());
    assert!(!unit.join(".select_complete").exists());
}

#[test]
fn fatal_failure_is_contained_to_its_unit() {
    let fx = fixture();
    let mut stubs = fx.default_stubs(&["p1", "p2"]);
    stubs.reconstruct = fx.stub_reconstruct("case \"$ssm\" in */p1/*) exit 7 ;; esac");
    let mut args = fx.run_args(&stubs, 3, 2);
    args.push("--local".to_string());

    let output = run_pflow(&args);
    assert!(!output.status.success(), "a fatally failed unit must surface");

    // The sibling unit still ran to completion.
    assert!(fx.unit_dir("p2").join(".select_complete").is_file());
    assert!(!fx.unit_dir("p1").join(".aggregate_complete").exists());

    let aggregate_log = fs::read_to_string(fx.log("aggregate")).expect("read aggregate log");
    assert_eq!(aggregate_log.lines().count(), 1);
    assert!(aggregate_log.contains("/p2/"));
}

#[test]
fn deleted_marker_reruns_exactly_that_step() {
    let fx = fixture();
    let stubs = fx.default_stubs(&["p1"]);
    let mut args = fx.run_args(&stubs, 2, 2);
    args.push("--local".to_string());

    assert_success(&run_pflow(&args));
    assert_eq!(invocation_count(&fx.log("aggregate")), 1);
    assert_eq!(invocation_count(&fx.log("select")), 1);

    // A crash between step execution and marker write leaves no marker;
    // removing it reproduces that state.
    fs::remove_file(fx.unit_dir("p1").join(".aggregate_complete")).expect("remove marker");

    assert_success(&run_pflow(&args));
    assert_eq!(invocation_count(&fx.log("aggregate")), 2);
    assert_eq!(invocation_count(&fx.log("select")), 1);
}

#[test]
fn missing_source_is_a_configuration_error() {
    let fx = fixture();
    let stubs = fx.default_stubs(&["p1"]);
    let mut args = fx.run_args(&stubs, 2, 2);
    args.push("--local".to_string());
    let source_index = args
        .iter()
        .position(|arg| arg == "--source")
        .expect("source flag")
        + 1;
    args[source_index] = fx.root.join("missing.csv").display().to_string();

    let output = run_pflow(&args);
    assert!(!output.status.success());
    assert_eq!(invocation_count(&fx.log("preprocess")), 0);
    assert!(!fx.root.join("units.txt").exists());
}
