//! ---
//! cosim_section: "05-bridge-loop"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Bridge orchestration: simulator contract, run state, step loop."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Orchestration layer of the co-simulation bridge.
//!
//! One run couples a [`GridSimulator`] backend to a hardware channel for a
//! fixed simulated horizon: settle the grid, wait for the hardware
//! bootstrap, then step on the handshake cadence. Every completed step adds
//! a row to the status table; the run ends by reaching the horizon, by a
//! simulator failure, or by a shutdown request, and in all three cases the
//! recorded rows are exported along with a JSON summary.

pub mod cosim;
pub mod report;
pub mod simulator;
pub mod status;

/// Shared result type for recorder and export operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error type for status recording and artifact export.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Wrapper for IO errors while writing run artifacts.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for CSV export failures.
    #[error("csv export error: {0}")]
    Csv(#[from] csv::Error),
    /// Wrapper for summary serialization failures.
    #[error("summary serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use cosim::CosimLoop;
pub use report::{RunOutcome, RunReport, RunSummary};
pub use simulator::{GridSimulator, SimulatorError};
pub use status::{RunStatus, StatusRecorder, StatusRow, StatusTable};
