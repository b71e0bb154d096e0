//! ---
//! cosim_section: "03-handshake-sync"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Bounded retry policy with an optional fixed inter-attempt pause."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::thread;
use std::time::Duration;

use r_cosim_common::config::RetryConfig;

/// Bounded retry discipline for one handshake step.
///
/// A step polls the read channel at most `max_attempts` times, pausing a
/// fixed `delay` between attempts. A zero delay busy-polls, which is what
/// tests use to stay fast and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Build a policy with explicit bounds.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Build a policy from the validated configuration section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.delay)
    }

    /// Busy-polling policy for tests.
    pub fn without_delay(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Attempt budget per step.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Configured pause between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Pause between two attempts; a zero delay returns immediately.
    pub fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}
