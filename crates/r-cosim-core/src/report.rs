//! ---
//! cosim_section: "05-bridge-loop"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Run outcome, summary artifact, and report handed back to callers."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use r_cosim_control::AceController;
use serde::Serialize;

use crate::status::StatusTable;
use crate::Result;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// All planned steps completed.
    Completed,
    /// The simulator advance reported a non-zero exit code.
    SimulatorFailure {
        /// Exit code reported by the backend.
        exit_code: i32,
    },
    /// A shutdown request ended the run early.
    Interrupted,
}

impl RunOutcome {
    /// Whether recorded data reflects the full planned horizon.
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    /// Process exit code the daemon maps this outcome to.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed | RunOutcome::Interrupted => 0,
            RunOutcome::SimulatorFailure { .. } => 1,
        }
    }
}

/// Summary artifact written next to the status table.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Case label the run was coupled against.
    pub case_label: String,
    /// Run stamp shared by all artifacts of this run.
    pub stamp: String,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Steps the horizon asked for.
    pub steps_planned: u64,
    /// Steps actually completed.
    pub iter_total: u64,
    /// Steps that missed the soft wall-clock deadline.
    pub iter_fail: u64,
    /// Steps that proceeded on last-good power after retry exhaustion.
    pub fallback_steps: u64,
    /// Mean wall-clock seconds per phase, keyed tr/tw/tsim/tall.
    pub mean_timings_s: IndexMap<String, f64>,
    /// Final controller state.
    pub ace: AceController,
}

impl RunSummary {
    /// Serialize the summary as pretty JSON at `path`.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(&json)?;
        Ok(())
    }
}

/// Everything a caller gets back from a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Finalized status table.
    pub table: StatusTable,
    /// Summary written alongside the table.
    pub summary: RunSummary,
    /// Path of the exported CSV table.
    pub csv_path: PathBuf,
    /// Path of the exported JSON summary.
    pub summary_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusRecorder;
    use tempfile::tempdir;

    #[test]
    fn outcome_maps_to_process_exit_codes() {
        assert_eq!(RunOutcome::Completed.exit_code(), 0);
        assert_eq!(RunOutcome::Interrupted.exit_code(), 0);
        assert_eq!(RunOutcome::SimulatorFailure { exit_code: 7 }.exit_code(), 1);
    }

    #[test]
    fn summary_serializes_with_tagged_outcome() {
        let table = StatusRecorder::new(0).finalize();
        let summary = RunSummary {
            case_label: "kundur_htb".to_owned(),
            stamp: "20260825_0900".to_owned(),
            outcome: RunOutcome::SimulatorFailure { exit_code: 3 },
            steps_planned: 20,
            iter_total: 4,
            iter_fail: 1,
            fallback_steps: 2,
            mean_timings_s: table.mean_timings(),
            ace: AceController::new(0.005, 0.001, 0.0),
        };
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("summary.json");
        summary.write_json(&path).expect("write summary");

        let text = std::fs::read_to_string(&path).expect("read summary");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["outcome"]["kind"], "simulator_failure");
        assert_eq!(value["outcome"]["exit_code"], 3);
        assert_eq!(value["iter_total"], 4);
        assert_eq!(value["ace"]["kp"], 0.005);
        assert!(value["mean_timings_s"]["tall"].is_number());
    }
}
