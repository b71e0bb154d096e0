//! ---
//! cosim_section: "05-bridge-loop"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "The per-step co-simulation loop coupling channel, controller, and simulator."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::fs;
use std::time::{Duration, Instant};

use anyhow::Context;
use r_cosim_channel::{Channel, WriteFrame};
use r_cosim_common::config::BridgeConfig;
use r_cosim_common::shutdown::ShutdownFlag;
use r_cosim_common::time::{run_stamp, secs_since};
use r_cosim_control::{AceController, AgcSchedule};
use r_cosim_sync::{CounterSync, RetryPolicy};
use tracing::{debug, error, info, warn};

use crate::report::{RunOutcome, RunReport, RunSummary};
use crate::simulator::GridSimulator;
use crate::status::{RunStatus, StatusRecorder};

/// Steps between progress log lines.
const PROGRESS_EVERY: u64 = 200;

/// One co-simulation run: channel, handshake, controller, and simulator
/// driven on a single thread at the handshake cadence.
///
/// The step order is fixed: acquire the handshake read, push the outbound
/// frame, set the coupling load, advance the simulator, then run the AGC
/// schedule and bookkeeping. The injection must see the power decoded in
/// the same step, and the frame written must carry the state the hardware
/// is reacting to while the simulator advances.
pub struct CosimLoop<C: Channel, S: GridSimulator> {
    config: BridgeConfig,
    channel: C,
    simulator: S,
    sync: CounterSync,
    controller: AceController,
    schedule: AgcSchedule,
    status: RunStatus,
    recorder: StatusRecorder,
    shutdown: ShutdownFlag,
    fallback_steps: u64,
}

impl<C: Channel, S: GridSimulator> CosimLoop<C, S> {
    /// Assemble a run from a validated configuration.
    pub fn new(config: BridgeConfig, channel: C, simulator: S, shutdown: ShutdownFlag) -> Self {
        let policy = RetryPolicy::from_config(&config.retry);
        let sync = CounterSync::new(
            &config.channel,
            policy,
            config.run.test_mode,
            Duration::from_secs_f64(config.run.t_step),
        );
        let controller = AceController::from_config(&config.agc);
        let schedule = AgcSchedule::from_config(&config.agc, config.run.t_step);
        let recorder = StatusRecorder::new(config.run.steps_total());
        Self {
            config,
            channel,
            simulator,
            sync,
            controller,
            schedule,
            status: RunStatus::new(),
            recorder,
            shutdown,
            fallback_steps: 0,
        }
    }

    /// Execute the run to its end and export the artifacts.
    ///
    /// The status table and summary are written for every outcome,
    /// including simulator failures and interrupts; whatever steps
    /// completed are preserved.
    pub fn run(mut self) -> anyhow::Result<RunReport> {
        let stamp = run_stamp();
        let steps_planned = self.config.run.steps_total();
        info!(
            case = %self.simulator.case_label(),
            tf = self.config.run.tf,
            t_step = self.config.run.t_step,
            steps = steps_planned,
            test_mode = self.config.run.test_mode,
            agc_enabled = self.config.agc.enabled,
            channel = %self.channel.describe(),
            "bridge run starting"
        );

        let outcome = self.drive()?;
        let case_label = self.simulator.case_label().to_owned();

        let Self {
            config,
            controller,
            recorder,
            status,
            fallback_steps,
            ..
        } = self;

        let table = recorder.finalize();
        fs::create_dir_all(&config.output.directory).with_context(|| {
            format!(
                "unable to create output directory {}",
                config.output.directory.display()
            )
        })?;
        let csv_path = config
            .output
            .directory
            .join(format!("{}_{}.csv", config.output.file_prefix, stamp));
        table
            .write_csv(&csv_path)
            .with_context(|| format!("unable to export status table to {}", csv_path.display()))?;

        let summary = RunSummary {
            case_label,
            stamp,
            outcome,
            steps_planned,
            iter_total: status.iter_total,
            iter_fail: status.iter_fail,
            fallback_steps,
            mean_timings_s: table.mean_timings(),
            ace: controller,
        };
        let summary_path = config
            .output
            .directory
            .join(format!("{}_{}_summary.json", config.output.file_prefix, summary.stamp));
        summary
            .write_json(&summary_path)
            .with_context(|| format!("unable to export run summary to {}", summary_path.display()))?;

        info!(
            outcome = ?outcome,
            rows = table.row_count(),
            iter_fail = summary.iter_fail,
            fallback_steps = summary.fallback_steps,
            csv = %csv_path.display(),
            "bridge run finished"
        );
        Ok(RunReport {
            outcome,
            table,
            summary,
            csv_path,
            summary_path,
        })
    }

    fn drive(&mut self) -> anyhow::Result<RunOutcome> {
        self.simulator
            .run_power_flow()
            .context("initial power flow failed")?;

        if self.config.run.ti > 0.0 {
            debug!(ti = self.config.run.ti, "settling before handshake");
            let exit_code = self.simulator.advance_and_run(self.config.run.ti);
            if exit_code != 0 {
                error!(exit_code, "settle advance failed before handshake");
                return Ok(RunOutcome::SimulatorFailure { exit_code });
            }
            self.status.tf = self.config.run.ti;
        }

        let init = self.sync.await_init(&mut self.channel, &self.shutdown);
        if init.is_aborted() {
            return Ok(RunOutcome::Interrupted);
        }
        self.status.kr = self.sync.base();

        let (p_base, q_base) = self.simulator.coupling_load_base();
        let steps_planned = self.config.run.steps_total();
        let t_step = self.config.run.t_step;
        let soft_deadline = 2.0 * t_step;
        debug!(p_base, q_base, soft_deadline_s = soft_deadline, "entering step loop");

        loop {
            if self.status.k >= steps_planned {
                return Ok(RunOutcome::Completed);
            }
            if self.shutdown.is_requested() {
                info!(step = self.status.k, "shutdown requested, ending run");
                return Ok(RunOutcome::Interrupted);
            }

            let step_start = Instant::now();
            let input = self.sync.next_step(&mut self.channel);
            self.status.tr = secs_since(step_start);
            self.status.k += 1;
            self.status.kr = input.counter;
            self.status.p = input.p;
            self.status.q = input.q;
            let (p_def, q_def) = self.sync.fallback();
            self.status.p_def = p_def;
            self.status.q_def = q_def;
            if input.used_fallback {
                self.fallback_steps += 1;
            }

            self.status.freq = self.simulator.coupling_frequency();
            self.status.v = self.simulator.coupling_voltage();
            let frame = WriteFrame {
                voltage: self.status.v,
                frequency: self.status.freq,
            };
            let write_start = Instant::now();
            if let Err(err) = self.channel.write(&frame) {
                error!(step = self.status.k, error = %err, "write channel failed, frame abandoned");
            }
            self.status.tw = secs_since(write_start);

            let (p_inj, q_inj) = if self.config.run.load_injection {
                (input.p, input.q)
            } else {
                (0.0, 0.0)
            };
            self.simulator.set_coupling_load(p_base + p_inj, q_base + q_inj);

            let end_time = self.config.run.ti + self.status.k as f64 * t_step;
            let sim_start = Instant::now();
            let exit_code = self.simulator.advance_and_run(end_time);
            self.status.tsim = secs_since(sim_start);
            if exit_code != 0 {
                error!(
                    step = self.status.k,
                    exit_code, "simulator advance failed, terminating run"
                );
                return Ok(RunOutcome::SimulatorFailure { exit_code });
            }
            let step_elapsed = secs_since(step_start);

            if self.schedule.due(self.status.k) {
                let ace = self.simulator.area_control_error();
                let raw = self.controller.update(ace);
                let applied = if self.config.agc.enabled { raw } else { 0.0 };
                self.simulator.set_governor_aux(applied);
                debug!(step = self.status.k, ace, raw, applied, "agc update");
            }

            if step_elapsed > soft_deadline {
                self.status.iter_fail += 1;
                warn!(
                    step = self.status.k,
                    elapsed_s = step_elapsed,
                    budget_s = soft_deadline,
                    "step exceeded soft deadline"
                );
            }

            self.status.tf = end_time;
            self.recorder.record(&self.status);
            self.status.iter_total += 1;

            if self.status.k % PROGRESS_EVERY == 0 {
                info!(
                    step = self.status.k,
                    of = steps_planned,
                    kr = self.status.kr,
                    freq = self.status.freq,
                    v = self.status.v,
                    "bridge progress"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatorError;
    use parking_lot::Mutex;
    use r_cosim_channel::InMemoryChannel;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[derive(Debug, Default)]
    struct StubState {
        aux: Vec<f64>,
        loads: Vec<(f64, f64)>,
        advances: Vec<f64>,
        power_flows: u32,
    }

    #[derive(Clone)]
    struct StubSimulator {
        state: Arc<Mutex<StubState>>,
        fail_at_advance: Option<usize>,
        advance_delay: Option<Duration>,
        freq: f64,
        v: f64,
        ace: f64,
        base: (f64, f64),
    }

    impl StubSimulator {
        fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(StubState::default())),
                fail_at_advance: None,
                advance_delay: None,
                freq: 0.9998,
                v: 1.0,
                ace: 0.2,
                base: (1.0, 0.5),
            }
        }

        fn failing_at(mut self, advance_call: usize) -> Self {
            self.fail_at_advance = Some(advance_call);
            self
        }

        fn delayed_by(mut self, delay: Duration) -> Self {
            self.advance_delay = Some(delay);
            self
        }
    }

    impl GridSimulator for StubSimulator {
        fn case_label(&self) -> &str {
            "stub-case"
        }

        fn run_power_flow(&mut self) -> Result<(), SimulatorError> {
            self.state.lock().power_flows += 1;
            Ok(())
        }

        fn advance_and_run(&mut self, end_time: f64) -> i32 {
            if let Some(delay) = self.advance_delay {
                std::thread::sleep(delay);
            }
            let mut state = self.state.lock();
            state.advances.push(end_time);
            if self.fail_at_advance == Some(state.advances.len()) {
                return 3;
            }
            0
        }

        fn coupling_frequency(&self) -> f64 {
            self.freq
        }

        fn coupling_voltage(&self) -> f64 {
            self.v
        }

        fn area_control_error(&self) -> f64 {
            self.ace
        }

        fn coupling_load_base(&self) -> (f64, f64) {
            self.base
        }

        fn set_coupling_load(&mut self, p: f64, q: f64) {
            self.state.lock().loads.push((p, q));
        }

        fn set_governor_aux(&mut self, paux: f64) {
            self.state.lock().aux.push(paux);
        }
    }

    fn test_config(dir: &Path, steps: u64) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.run.test_mode = true;
        config.run.tf = steps as f64 * 0.05;
        config.run.ti = 0.0;
        config.retry.delay = Duration::ZERO;
        config.output.directory = dir.join("out");
        config
    }

    #[test]
    fn test_mode_run_completes_all_planned_steps() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path(), 5);
        let channel = InMemoryChannel::new();
        let simulator = StubSimulator::new();
        let run = CosimLoop::new(
            config,
            channel.clone(),
            simulator.clone(),
            ShutdownFlag::new(),
        );

        let report = run.run().expect("run succeeds");
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.table.row_count(), 5);
        let ks: Vec<u64> = report.table.rows().iter().map(|r| r.k).collect();
        assert_eq!(ks, vec![1, 2, 3, 4, 5]);
        let krs: Vec<i64> = report.table.rows().iter().map(|r| r.kr).collect();
        assert_eq!(krs, vec![12, 13, 14, 15, 16]);
        assert_eq!(report.summary.iter_total, 5);
        assert_eq!(report.summary.fallback_steps, 5, "no hardware behind test mode");
        assert_eq!(channel.writes().len(), 5);
        assert!(report.csv_path.exists());
        assert!(report.summary_path.exists());
        assert_eq!(simulator.state.lock().power_flows, 1);
    }

    #[test]
    fn simulator_failure_preserves_completed_rows() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path(), 8);
        let simulator = StubSimulator::new().failing_at(5);
        let run = CosimLoop::new(
            config,
            InMemoryChannel::new(),
            simulator,
            ShutdownFlag::new(),
        );

        let report = run.run().expect("run exports despite failure");
        assert_eq!(report.outcome, RunOutcome::SimulatorFailure { exit_code: 3 });
        assert_eq!(report.table.row_count(), 4, "failing step records no row");
        assert_eq!(report.summary.iter_total, 4);
        assert!(report.csv_path.exists());
    }

    #[test]
    fn write_failures_do_not_end_the_run() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path(), 2);
        let channel = InMemoryChannel::new();
        channel.fail_writes(true);
        let run = CosimLoop::new(
            config,
            channel.clone(),
            StubSimulator::new(),
            ShutdownFlag::new(),
        );

        let report = run.run().expect("run succeeds");
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.table.row_count(), 2);
        assert!(channel.writes().is_empty());
    }

    #[test]
    fn early_shutdown_exports_an_empty_table() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path(), 5);
        let shutdown = ShutdownFlag::new();
        shutdown.request();
        let run = CosimLoop::new(
            config,
            InMemoryChannel::new(),
            StubSimulator::new(),
            shutdown,
        );

        let report = run.run().expect("run exports");
        assert_eq!(report.outcome, RunOutcome::Interrupted);
        assert_eq!(report.table.row_count(), 0);
        let content = std::fs::read_to_string(&report.csv_path).expect("csv");
        assert_eq!(content.lines().count(), 1, "header only");
    }

    #[test]
    fn slow_steps_count_soft_deadline_misses() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path(), 2);
        // Soft deadline is 2 * t_step = 100ms; every advance blows through it.
        let simulator = StubSimulator::new().delayed_by(Duration::from_millis(120));
        let run = CosimLoop::new(
            config,
            InMemoryChannel::new(),
            simulator,
            ShutdownFlag::new(),
        );

        let report = run.run().expect("run succeeds");
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.table.row_count(), 2, "misses are soft, steps still record");
        assert_eq!(report.summary.iter_fail, 2);
    }

    #[test]
    fn agc_runs_on_schedule_with_the_pi_output() {
        let dir = tempdir().expect("tempdir");
        let mut config = test_config(dir.path(), 4);
        config.agc.interval = 0.1;
        let simulator = StubSimulator::new();
        let run = CosimLoop::new(
            config,
            InMemoryChannel::new(),
            simulator.clone(),
            ShutdownFlag::new(),
        );
        run.run().expect("run succeeds");

        let aux = simulator.state.lock().aux.clone();
        assert_eq!(aux.len(), 2, "due on steps 2 and 4");
        // First update: integral = 0.2, raw = -(0.005*0.2 + 0.001*0.2)
        assert!((aux[0] - (-0.0012)).abs() < 1e-12);
        assert!(aux[1] < aux[0], "integral keeps accumulating");
    }

    #[test]
    fn disabled_agc_still_updates_but_applies_zero() {
        let dir = tempdir().expect("tempdir");
        let mut config = test_config(dir.path(), 4);
        config.agc.interval = 0.1;
        config.agc.enabled = false;
        let simulator = StubSimulator::new();
        let run = CosimLoop::new(
            config,
            InMemoryChannel::new(),
            simulator.clone(),
            ShutdownFlag::new(),
        );
        let report = run.run().expect("run succeeds");

        let aux = simulator.state.lock().aux.clone();
        assert_eq!(aux, vec![0.0, 0.0]);
        assert!(
            (report.summary.ace.integral() - 0.4).abs() < 1e-12,
            "integral tracked both updates"
        );
    }

    #[test]
    fn load_injection_adds_decoded_power_to_the_baseline() {
        let dir = tempdir().expect("tempdir");
        let config = test_config(dir.path(), 1);
        let channel = InMemoryChannel::new();
        channel.push_reading(99, 0.2, 0.1);
        let simulator = StubSimulator::new();
        let run = CosimLoop::new(
            config,
            channel,
            simulator.clone(),
            ShutdownFlag::new(),
        );
        run.run().expect("run succeeds");

        let loads = simulator.state.lock().loads.clone();
        assert_eq!(loads.len(), 1);
        assert!((loads[0].0 - 1.2).abs() < 1e-12);
        assert!((loads[0].1 - 0.6).abs() < 1e-12);
    }

    #[test]
    fn load_injection_switch_pins_the_baseline() {
        let dir = tempdir().expect("tempdir");
        let mut config = test_config(dir.path(), 1);
        config.run.load_injection = false;
        let channel = InMemoryChannel::new();
        channel.push_reading(99, 0.2, 0.1);
        let simulator = StubSimulator::new();
        let run = CosimLoop::new(
            config,
            channel,
            simulator.clone(),
            ShutdownFlag::new(),
        );
        let report = run.run().expect("run succeeds");

        let loads = simulator.state.lock().loads.clone();
        assert_eq!(loads, vec![(1.0, 0.5)]);
        // The decoded power is still observed and recorded.
        assert!((report.table.rows()[0].p - 0.2).abs() < 1e-12);
    }

    #[test]
    fn settle_advance_precedes_handshake_steps() {
        let dir = tempdir().expect("tempdir");
        let mut config = test_config(dir.path(), 2);
        config.run.ti = 0.5;
        let simulator = StubSimulator::new();
        let run = CosimLoop::new(
            config,
            InMemoryChannel::new(),
            simulator.clone(),
            ShutdownFlag::new(),
        );
        let report = run.run().expect("run succeeds");

        let advances = simulator.state.lock().advances.clone();
        assert_eq!(advances.len(), 3);
        assert!((advances[0] - 0.5).abs() < 1e-12);
        assert!((advances[1] - 0.55).abs() < 1e-12);
        assert!((advances[2] - 0.6).abs() < 1e-12);
        assert!((report.table.rows()[1].tf - 0.6).abs() < 1e-12);
    }

    #[test]
    fn settle_failure_terminates_before_any_handshake() {
        let dir = tempdir().expect("tempdir");
        let mut config = test_config(dir.path(), 2);
        config.run.ti = 0.5;
        let simulator = StubSimulator::new().failing_at(1);
        let run = CosimLoop::new(
            config,
            InMemoryChannel::new(),
            simulator,
            ShutdownFlag::new(),
        );
        let report = run.run().expect("run exports");
        assert_eq!(report.outcome, RunOutcome::SimulatorFailure { exit_code: 3 });
        assert_eq!(report.table.row_count(), 0);
    }
}
