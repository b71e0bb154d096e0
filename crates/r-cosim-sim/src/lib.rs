//! ---
//! cosim_section: "06-synthetic-grid"
//! cosim_subsection: "01-bootstrap"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Synthetic grid module exports."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
//! Deterministic synthetic grid backend for the R-COSIM bridge.
//!
//! Lets the full bridge loop run without HTB hardware or a transient
//! stability program behind it. The backend fabricates plausible coupling
//! telemetry; it is not a power-system solver.

#![warn(missing_docs)]

pub mod grid;

pub use grid::SyntheticGrid;
