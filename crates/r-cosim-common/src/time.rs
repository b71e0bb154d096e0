//! ---
//! cosim_section: "01-bridge-runtime"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Wall-clock helpers for run stamping and step timing."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::time::Instant;

use chrono::Local;

/// Timestamp used to name a run's output artifacts, minute resolution.
pub fn run_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M").to_string()
}

/// Elapsed wall-clock seconds between two instants.
pub fn secs_between(start: Instant, end: Instant) -> f64 {
    end.duration_since(start).as_secs_f64()
}

/// Elapsed wall-clock seconds since `start`.
pub fn secs_since(start: Instant) -> f64 {
    secs_between(start, Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn run_stamp_has_minute_resolution() {
        let stamp = run_stamp();
        assert_eq!(stamp.len(), "YYYYMMDD_HHMM".len());
        assert_eq!(stamp.chars().filter(|c| *c == '_').count(), 1);
    }

    #[test]
    fn secs_between_is_non_negative() {
        let start = Instant::now();
        let end = start + Duration::from_millis(20);
        let secs = secs_between(start, end);
        assert!((secs - 0.02).abs() < 1e-9);
    }
}
