//! ---
//! cosim_section: "07-testing-qa"
//! cosim_subsection: "integration-tests"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "End-to-end bridge runs over the file channel in test mode."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::time::Duration;

use r_cosim_channel::FileChannel;
use r_cosim_common::config::BridgeConfig;
use r_cosim_common::shutdown::ShutdownFlag;
use r_cosim_core::{CosimLoop, RunOutcome};
use r_cosim_sim::SyntheticGrid;

fn test_mode_config(root: &Path, steps: u64) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.run.test_mode = true;
    config.run.tf = steps as f64 * config.run.t_step;
    config.run.ti = 0.0;
    config.retry.delay = Duration::ZERO;
    config.channel.data_dir = root.join("data");
    config.output.directory = root.join("out");
    config.synthetic.noise_std = 0.0;
    config.validate().expect("test configuration must validate");
    config
}

fn run_to_report(config: BridgeConfig) -> r_cosim_core::RunReport {
    let channel = FileChannel::new(&config.channel).expect("file channel");
    let grid = SyntheticGrid::from_config(&config);
    CosimLoop::new(config, channel, grid, ShutdownFlag::new())
        .run()
        .expect("run exports artifacts")
}

#[test]
fn test_mode_run_records_every_planned_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = run_to_report(test_mode_config(dir.path(), 20));

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.table.row_count(), 20);
    for (i, row) in report.table.rows().iter().enumerate() {
        assert_eq!(row.k, i as u64 + 1, "steps must be strictly sequential");
        assert!(
            (row.tall - (row.tr + row.tw + row.tsim)).abs() < 1e-12,
            "tall must be the sum of the phase timings"
        );
    }

    let csv = fs::read_to_string(&report.csv_path).expect("csv file");
    assert_eq!(csv.lines().count(), 21, "header plus one line per step");
    assert!(csv.starts_with("kr,k,v,freq,p,q,p_def,q_def,tw,tr,tsim,tf,tall"));
}

#[test]
fn summary_artifact_reflects_a_completed_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = run_to_report(test_mode_config(dir.path(), 10));

    let raw = fs::read_to_string(&report.summary_path).expect("summary file");
    let summary: serde_json::Value = serde_json::from_str(&raw).expect("summary parses");
    assert_eq!(summary["outcome"]["kind"], "completed");
    assert_eq!(summary["steps_planned"], 10);
    assert_eq!(summary["iter_total"], 10);
    assert!(summary["mean_timings_s"]["tall"].is_number());
    assert!(summary["ace"]["integral"].is_number());
}

#[test]
fn scripted_simulator_failure_keeps_earlier_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = test_mode_config(dir.path(), 10);
    config.synthetic.fail_at_step = Some(5);
    let report = run_to_report(config);

    assert!(matches!(
        report.outcome,
        RunOutcome::SimulatorFailure { exit_code } if exit_code != 0
    ));
    assert_eq!(report.outcome.exit_code(), 1);
    assert_eq!(report.table.row_count(), 4, "failing step records no row");

    let raw = fs::read_to_string(&report.summary_path).expect("summary file");
    let summary: serde_json::Value = serde_json::from_str(&raw).expect("summary parses");
    assert_eq!(summary["outcome"]["kind"], "simulator_failure");
}

#[test]
fn pre_run_shutdown_still_exports_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_mode_config(dir.path(), 10);
    let channel = FileChannel::new(&config.channel).expect("file channel");
    let grid = SyntheticGrid::from_config(&config);
    let shutdown = ShutdownFlag::new();
    shutdown.request();

    let report = CosimLoop::new(config, channel, grid, shutdown)
        .run()
        .expect("run exports artifacts");
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.outcome.exit_code(), 0);
    assert_eq!(report.table.row_count(), 0);
    let csv = fs::read_to_string(&report.csv_path).expect("csv file");
    assert_eq!(csv.lines().count(), 1, "header only");
}
