//! ---
//! cosim_section: "04-agc-control"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "PI law over the accumulated area control error."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use r_cosim_common::config::AgcConfig;
use serde::Serialize;
use tracing::trace;

/// PI controller over the area control error.
///
/// `update` accumulates the error into the integral and produces the raw
/// governor auxiliary input `-(kp * ace + ki * integral)`. The sign flip
/// makes a positive accumulated error pull generation down. The controller
/// keeps integrating even while AGC application is disabled; the enable
/// flag is the loop's concern, so re-enabling mid-run resumes from an
/// integral that tracked the whole history.
#[derive(Debug, Clone, Serialize)]
pub struct AceController {
    kp: f64,
    ki: f64,
    integral: f64,
    raw: f64,
}

impl AceController {
    /// Build a controller with explicit gains and an integral seed.
    ///
    /// The initial raw output reflects the seed alone, as if the last
    /// update had seen a zero instantaneous error.
    pub fn new(kp: f64, ki: f64, integral0: f64) -> Self {
        Self {
            kp,
            ki,
            integral: integral0,
            raw: -(ki * integral0),
        }
    }

    /// Build a controller from the validated AGC configuration section.
    pub fn from_config(config: &AgcConfig) -> Self {
        Self::new(config.kp, config.ki, config.integral0)
    }

    /// Fold one area-control-error sample into the controller state.
    ///
    /// Returns the new raw governor auxiliary input, also available from
    /// [`AceController::raw`] until the next update.
    pub fn update(&mut self, ace: f64) -> f64 {
        self.integral += ace;
        self.raw = -(self.kp * ace + self.ki * self.integral);
        trace!(ace, integral = self.integral, raw = self.raw, "ace update");
        self.raw
    }

    /// Raw output of the most recent update.
    pub fn raw(&self) -> f64 {
        self.raw
    }

    /// Accumulated error integral.
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_seeds_raw_from_the_integral() {
        let controller = AceController::new(0.005, 0.001, 2.0);
        assert!((controller.raw() - (-0.002)).abs() < 1e-15);
        assert_eq!(controller.integral(), 2.0);

        let zeroed = AceController::new(0.005, 0.001, 0.0);
        assert_eq!(zeroed.raw(), 0.0);
    }

    #[test]
    fn update_sequence_matches_the_pi_law() {
        let mut controller = AceController::new(0.005, 0.001, 0.0);

        let first = controller.update(0.1);
        assert!((controller.integral() - 0.1).abs() < 1e-15);
        assert!((first - (-0.0006)).abs() < 1e-15);

        let second = controller.update(-0.05);
        assert!((controller.integral() - 0.05).abs() < 1e-15);
        assert!((second - 0.0002).abs() < 1e-15);
        assert_eq!(controller.raw(), second);
    }

    #[test]
    fn identical_sequences_produce_identical_state() {
        let samples = [0.02, -0.01, 0.001, 0.15, -0.3];
        let mut a = AceController::new(0.004, 0.002, 0.5);
        let mut b = AceController::new(0.004, 0.002, 0.5);
        for sample in samples {
            a.update(sample);
            b.update(sample);
        }
        assert_eq!(a.raw(), b.raw());
        assert_eq!(a.integral(), b.integral());
    }
}
