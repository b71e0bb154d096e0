//! ---
//! cosim_section: "03-handshake-sync"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Expectation state machine for the cyclic handshake counter."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::thread;
use std::time::Duration;

use r_cosim_channel::Channel;
use r_cosim_common::config::ChannelConfig;
use r_cosim_common::shutdown::ShutdownFlag;
use tracing::{debug, info, trace, warn};

use crate::retry::RetryPolicy;

/// How often the bootstrap wait complains about absent hardware, in polls.
const INIT_NAG_EVERY: u64 = 100;

/// Result of the bootstrap wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The hardware produced the bootstrap counter.
    Synchronized {
        /// Polls consumed before the bootstrap frame appeared.
        attempts: u64,
    },
    /// Test mode fabricated the bootstrap without hardware agreement.
    Forced,
    /// Shutdown was requested before synchronization.
    Aborted,
}

impl InitOutcome {
    /// Whether the wait ended because of a shutdown request.
    pub fn is_aborted(&self) -> bool {
        matches!(self, InitOutcome::Aborted)
    }
}

/// Power and provenance handed to the loop for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInput {
    /// Counter the handshake settled on for this step.
    pub counter: i64,
    /// Active power injection, per-unit.
    pub p: f64,
    /// Reactive power injection, per-unit.
    pub q: f64,
    /// Read attempts consumed, including the successful one.
    pub attempts: u32,
    /// True when the attempt budget ran out and last-good power was used.
    pub used_fallback: bool,
}

/// Expectation state machine for the cyclic handshake counter.
///
/// Holds the last committed counter (the base); a step commits when the
/// channel produces exactly base + 1. Committing the wrap-high value resets
/// the base to the wrap base, so the next expected counter is the bootstrap
/// value again. Every well-formed read refreshes the fallback power, which
/// is what a step falls back to when its attempt budget runs out; liveness
/// is preferred over freshness.
#[derive(Debug)]
pub struct CounterSync {
    base: i64,
    bootstrap: i64,
    wrap_high: i64,
    wrap_base: i64,
    test_mode: bool,
    policy: RetryPolicy,
    init_poll: Duration,
    fallback_p: f64,
    fallback_q: f64,
    last_seen: Option<i64>,
}

impl CounterSync {
    /// Build the handshake over a validated channel configuration.
    ///
    /// `init_poll` is the pause between bootstrap polls; the step cadence
    /// of the hardware is the natural choice.
    pub fn new(
        config: &ChannelConfig,
        policy: RetryPolicy,
        test_mode: bool,
        init_poll: Duration,
    ) -> Self {
        Self {
            base: config.wrap_base,
            bootstrap: config.bootstrap_counter,
            wrap_high: config.wrap_high,
            wrap_base: config.wrap_base,
            test_mode,
            policy,
            init_poll,
            fallback_p: config.p_default,
            fallback_q: config.q_default,
            last_seen: None,
        }
    }

    /// Counter the next step will require.
    pub fn expected(&self) -> i64 {
        self.base + 1
    }

    /// Last committed counter.
    pub fn base(&self) -> i64 {
        self.base
    }

    /// Current fallback power, refreshed by every well-formed read.
    pub fn fallback(&self) -> (f64, f64) {
        (self.fallback_p, self.fallback_q)
    }

    /// Block until the hardware starts a session with the bootstrap counter.
    ///
    /// Unbounded: a bench without hardware sits here until shutdown, nagging
    /// periodically. Test mode returns after a single poll, adopting
    /// whatever power the poll produced.
    pub fn await_init<C: Channel>(&mut self, channel: &mut C, shutdown: &ShutdownFlag) -> InitOutcome {
        let mut attempts = 0u64;
        loop {
            if shutdown.is_requested() {
                info!(attempts, "bootstrap wait aborted by shutdown");
                return InitOutcome::Aborted;
            }
            attempts += 1;
            let read = channel.read();
            if read.ok {
                self.fallback_p = read.reading.p;
                self.fallback_q = read.reading.q;
                self.last_seen = Some(read.reading.counter);
            }

            if self.test_mode {
                self.base = self.bootstrap;
                info!(bootstrap = self.bootstrap, "bootstrap forced in test mode");
                return InitOutcome::Forced;
            }
            if read.ok && read.reading.counter == self.bootstrap {
                self.base = self.bootstrap;
                info!(attempts, bootstrap = self.bootstrap, "handshake synchronized");
                return InitOutcome::Synchronized { attempts };
            }

            if attempts % INIT_NAG_EVERY == 0 {
                warn!(
                    attempts,
                    bootstrap = self.bootstrap,
                    observed = ?self.last_seen,
                    "still waiting for hardware bootstrap"
                );
            }
            thread::sleep(self.init_poll);
        }
    }

    /// Acquire the input for one step, retrying within the attempt budget.
    ///
    /// On exhaustion the step proceeds with the freshest decodable power,
    /// and the base resynchronizes to the last well-formed counter seen in
    /// this window, if any. A defaulted read can never move the base.
    pub fn next_step<C: Channel>(&mut self, channel: &mut C) -> StepInput {
        let expected = self.expected();
        self.last_seen = None;
        let mut attempts = 0u32;

        while attempts < self.policy.max_attempts() {
            attempts += 1;
            let read = channel.read();
            if read.ok {
                self.fallback_p = read.reading.p;
                self.fallback_q = read.reading.q;
                self.last_seen = Some(read.reading.counter);
            }

            if self.test_mode {
                self.commit(expected);
                return StepInput {
                    counter: expected,
                    p: self.fallback_p,
                    q: self.fallback_q,
                    attempts,
                    used_fallback: !read.ok,
                };
            }
            if read.ok && read.reading.counter == expected {
                trace!(counter = expected, attempts, "handshake step committed");
                self.commit(expected);
                return StepInput {
                    counter: expected,
                    p: read.reading.p,
                    q: read.reading.q,
                    attempts,
                    used_fallback: false,
                };
            }

            debug!(
                attempt = attempts,
                expected,
                observed = ?read.ok.then_some(read.reading.counter),
                "handshake retry"
            );
            if attempts < self.policy.max_attempts() {
                self.policy.pause();
            }
        }

        warn!(
            expected,
            attempts,
            observed = ?self.last_seen,
            fallback_p = self.fallback_p,
            fallback_q = self.fallback_q,
            "handshake attempt budget exhausted, proceeding on last-good power"
        );
        if let Some(seen) = self.last_seen {
            self.commit(seen);
        }
        StepInput {
            counter: self.base,
            p: self.fallback_p,
            q: self.fallback_q,
            attempts,
            used_fallback: true,
        }
    }

    fn commit(&mut self, counter: i64) {
        self.base = if counter == self.wrap_high {
            self.wrap_base
        } else {
            counter
        };
    }
}
