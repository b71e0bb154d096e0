//! ---
//! cosim_section: "04-agc-control"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Integer-step cadence for controller updates."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use r_cosim_common::config::AgcConfig;

/// Integer-step cadence for AGC updates.
///
/// The update interval is expressed in simulated seconds in configuration
/// but applied in whole steps, so the cadence never depends on float
/// modulo behaviour. With a one-second interval and a 50 ms step the
/// controller runs on steps 20, 40, 60 and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgcSchedule {
    steps_per_interval: u64,
}

impl AgcSchedule {
    /// Build a schedule from an interval and step size in seconds.
    pub fn new(interval: f64, t_step: f64) -> Self {
        Self {
            steps_per_interval: (interval / t_step).round().max(1.0) as u64,
        }
    }

    /// Build a schedule from the validated AGC configuration section.
    pub fn from_config(config: &AgcConfig, t_step: f64) -> Self {
        Self::new(config.interval, t_step)
    }

    /// Steps between consecutive controller updates.
    pub fn steps_per_interval(&self) -> u64 {
        self.steps_per_interval
    }

    /// Whether the controller runs on step `k` (1-based).
    pub fn due(&self, k: u64) -> bool {
        k % self.steps_per_interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_interval_at_fifty_ms_runs_every_twenty_steps() {
        let schedule = AgcSchedule::new(1.0, 0.05);
        assert_eq!(schedule.steps_per_interval(), 20);
        assert!(!schedule.due(1));
        assert!(!schedule.due(19));
        assert!(schedule.due(20));
        assert!(!schedule.due(21));
        assert!(schedule.due(40));
    }

    #[test]
    fn non_divisible_interval_rounds_to_whole_steps() {
        let schedule = AgcSchedule::new(1.0, 0.03);
        assert_eq!(schedule.steps_per_interval(), 33);
        assert!(schedule.due(33));
        assert!(schedule.due(66));
        assert!(!schedule.due(34));
    }

    #[test]
    fn interval_equal_to_step_runs_every_step() {
        let schedule = AgcSchedule::new(0.05, 0.05);
        assert_eq!(schedule.steps_per_interval(), 1);
        assert!(schedule.due(1));
        assert!(schedule.due(2));
    }

    #[test]
    fn from_config_uses_the_configured_interval() {
        let config = AgcConfig {
            interval: 2.0,
            ..AgcConfig::default()
        };
        let schedule = AgcSchedule::from_config(&config, 0.05);
        assert_eq!(schedule.steps_per_interval(), 40);
    }
}
