//! ---
//! cosim_section: "04-agc-control"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "ACE feedback control and AGC cadence for the bridge loop."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Secondary frequency control for the co-simulation bridge.
//!
//! The grid simulator exposes an area control error each step; on the AGC
//! cadence the bridge folds it through a PI law and hands the result back
//! as a governor auxiliary input. Both pieces are pure state machines with
//! no IO, so the loop owns when they run and what their output is wired to.

pub mod ace;
pub mod schedule;

pub use ace::AceController;
pub use schedule::AgcSchedule;
