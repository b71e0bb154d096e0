//! ---
//! cosim_section: "01-bridge-runtime"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Shared primitives and utilities for the co-simulation bridge."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
//! Core shared primitives for the R-COSIM bridge workspace.
//! This crate exposes configuration loading, tracing setup, run timing, and
//! shutdown signalling utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod shutdown;
pub mod time;

pub use config::{
    AgcConfig, BridgeConfig, ChannelConfig, CounterRadix, LoggingConfig, OutputConfig, RetryConfig,
    RunConfig, SyntheticConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use shutdown::ShutdownFlag;
pub use time::{run_stamp, secs_between, secs_since};
