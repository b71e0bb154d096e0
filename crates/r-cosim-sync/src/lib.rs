//! ---
//! cosim_section: "03-handshake-sync"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Counter-sequenced handshake over the read channel."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Handshake layer of the co-simulation bridge.
//!
//! The hardware side stamps every frame with a cyclic counter. Progress of
//! the co-simulation is defined purely by that counter: a step may begin
//! once the observed counter is exactly one past the last committed value.
//! This crate owns the expectation state, the bootstrap wait, the bounded
//! per-step retry, the wraparound of the counter range, and the
//! last-good-power fallback that keeps the loop live when the hardware
//! stalls. Nothing here fails: every outcome is a value the loop acts on.

pub mod counter;
pub mod retry;

pub use counter::{CounterSync, InitOutcome, StepInput};
pub use retry::RetryPolicy;
