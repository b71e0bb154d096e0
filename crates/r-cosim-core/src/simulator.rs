//! ---
//! cosim_section: "05-bridge-loop"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Capability contract the bridge requires from a grid simulator."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use thiserror::Error;

/// Error type for simulator startup operations.
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// The initial power flow did not reach a solution.
    #[error("power flow did not converge: {0}")]
    PowerFlowDiverged(String),
    /// Backend-specific startup failure.
    #[error("simulator backend error: {0}")]
    Backend(String),
}

/// Capability surface the bridge requires from a grid-dynamics backend.
///
/// The contract is deliberately narrow: the bridge can solve the initial
/// power flow, advance time-domain simulation, observe the coupling bus,
/// and drive the coupling load and governor auxiliary input. Anything else
/// a backend does (case loading, solver choices, internal models) stays
/// behind this trait.
///
/// `advance_and_run` is blocking and reports failure through a process-style
/// exit code rather than an error: a non-zero code is the one fatal
/// condition of a run, and the loop preserves all recorded data when it
/// sees one. No call into the backend is ever cancelled mid-flight.
pub trait GridSimulator: Send {
    /// Label of the loaded case, for logs and the run summary.
    fn case_label(&self) -> &str;

    /// Solve the initial power flow before any time-domain stepping.
    fn run_power_flow(&mut self) -> Result<(), SimulatorError>;

    /// Advance the time-domain simulation to `end_time` seconds and block
    /// until it returns. Zero means success.
    fn advance_and_run(&mut self, end_time: f64) -> i32;

    /// System frequency at the coupling bus, per-unit.
    fn coupling_frequency(&self) -> f64;

    /// Voltage magnitude at the coupling bus, per-unit.
    fn coupling_voltage(&self) -> f64;

    /// Area control error of the coupling area, per-unit.
    fn area_control_error(&self) -> f64;

    /// Baseline (p, q) of the coupling load, captured before injection.
    fn coupling_load_base(&self) -> (f64, f64);

    /// Set the absolute coupling load for the next advance, per-unit.
    fn set_coupling_load(&mut self, p: f64, q: f64);

    /// Set the governor auxiliary input applied on the next advance.
    fn set_governor_aux(&mut self, paux: f64);
}
