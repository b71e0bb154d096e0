//! ---
//! cosim_section: "06-synthetic-grid"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Seeded synthetic grid implementing the bridge simulator contract."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use rand::prelude::*;
use rand_distr::Normal;

use r_cosim_common::config::{BridgeConfig, SyntheticConfig};
use r_cosim_core::{GridSimulator, SimulatorError};
use tracing::{debug, trace};

/// First-order frequency recovery time constant, seconds.
const TAU_FREQ: f64 = 4.0;
/// First-order voltage recovery time constant, seconds.
const TAU_VOLT: f64 = 1.0;
/// Steady-state frequency drop per per-unit of uncovered load.
const DROOP_SENS: f64 = 0.08;
/// Voltage sag per per-unit of active load above baseline.
const VOLT_SAG_P: f64 = 0.03;
/// Voltage sag per per-unit of reactive load above baseline.
const VOLT_SAG_Q: f64 = 0.05;
/// Area control error per per-unit of frequency deviation.
const FREQUENCY_BIAS: f64 = 25.0;
/// Coupling-bus baseline load when none is configured, per-unit.
const DEFAULT_P_BASE: f64 = 11.04;
const DEFAULT_Q_BASE: f64 = 2.50;
/// Exit code reported on a scripted advance failure.
const FAIL_EXIT_CODE: i32 = 2;

/// Deterministic seeded stand-in for a transient stability backend.
///
/// Frequency relaxes toward a droop equilibrium set by the uncovered load
/// (injection minus governor aux relief), voltage sags with load, and the
/// area control error is proportional to the frequency deviation. Together
/// with the PI feedback this closes a plausible regulation loop, which is
/// all a hardware-free bridge run needs. A scripted `fail_at_step` turns a
/// chosen advance into a non-zero exit code for fault-injection tests.
#[derive(Debug)]
pub struct SyntheticGrid {
    case_label: String,
    rng: StdRng,
    noise: Normal<f64>,
    fail_at_step: Option<u64>,
    advances: u64,
    time: f64,
    freq: f64,
    voltage: f64,
    p_base: f64,
    q_base: f64,
    p_load: f64,
    q_load: f64,
    paux: f64,
}

impl SyntheticGrid {
    /// Build a grid from the synthetic section of a validated configuration.
    pub fn new(case_label: impl Into<String>, config: &SyntheticConfig) -> Self {
        Self {
            case_label: case_label.into(),
            rng: StdRng::seed_from_u64(config.seed),
            noise: Normal::new(0.0, config.noise_std).expect("noise_std must be non-negative"),
            fail_at_step: config.fail_at_step,
            advances: 0,
            time: 0.0,
            freq: 1.0,
            voltage: 1.0,
            p_base: DEFAULT_P_BASE,
            q_base: DEFAULT_Q_BASE,
            p_load: DEFAULT_P_BASE,
            q_load: DEFAULT_Q_BASE,
            paux: 0.0,
        }
    }

    /// Build a grid for a whole bridge configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.run.case_label.clone(), &config.synthetic)
    }

    /// Override the coupling-bus baseline load.
    pub fn with_base_load(mut self, p: f64, q: f64) -> Self {
        self.p_base = p;
        self.q_base = q;
        self.p_load = p;
        self.q_load = q;
        self
    }

    /// Advances served so far, the settle advance included.
    pub fn advances(&self) -> u64 {
        self.advances
    }

    fn noise_sample(&mut self) -> f64 {
        self.noise.sample(&mut self.rng)
    }
}

impl GridSimulator for SyntheticGrid {
    fn case_label(&self) -> &str {
        &self.case_label
    }

    fn run_power_flow(&mut self) -> Result<(), SimulatorError> {
        if !self.p_load.is_finite() || !self.q_load.is_finite() {
            return Err(SimulatorError::PowerFlowDiverged(format!(
                "non-finite coupling load p={} q={}",
                self.p_load, self.q_load
            )));
        }
        self.freq = 1.0;
        self.voltage = 1.0
            - VOLT_SAG_P * (self.p_load - self.p_base)
            - VOLT_SAG_Q * (self.q_load - self.q_base);
        debug!(
            case = %self.case_label,
            v = self.voltage,
            "synthetic power flow converged"
        );
        Ok(())
    }

    fn advance_and_run(&mut self, end_time: f64) -> i32 {
        self.advances += 1;
        if self.fail_at_step == Some(self.advances) {
            debug!(
                advance = self.advances,
                end_time, "scripted synthetic failure"
            );
            return FAIL_EXIT_CODE;
        }
        let dt = end_time - self.time;
        if dt <= 0.0 {
            return 0;
        }
        self.time = end_time;

        let imbalance = (self.p_load - self.p_base) - self.paux;
        let freq_target = 1.0 - DROOP_SENS * imbalance;
        self.freq += (freq_target - self.freq) * (dt / TAU_FREQ).min(1.0) + self.noise_sample();

        let v_target = 1.0
            - VOLT_SAG_P * (self.p_load - self.p_base)
            - VOLT_SAG_Q * (self.q_load - self.q_base);
        self.voltage +=
            (v_target - self.voltage) * (dt / TAU_VOLT).min(1.0) + self.noise_sample() * 0.5;

        trace!(
            t = self.time,
            freq = self.freq,
            v = self.voltage,
            imbalance,
            "synthetic advance"
        );
        0
    }

    fn coupling_frequency(&self) -> f64 {
        self.freq
    }

    fn coupling_voltage(&self) -> f64 {
        self.voltage
    }

    fn area_control_error(&self) -> f64 {
        FREQUENCY_BIAS * (self.freq - 1.0)
    }

    fn coupling_load_base(&self) -> (f64, f64) {
        (self.p_base, self.q_base)
    }

    fn set_coupling_load(&mut self, p: f64, q: f64) {
        self.p_load = p;
        self.q_load = q;
    }

    fn set_governor_aux(&mut self, paux: f64) {
        self.paux = paux;
    }
}
