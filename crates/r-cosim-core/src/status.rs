//! ---
//! cosim_section: "05-bridge-loop"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Run status state, per-step recording, and the status table."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::Result;

/// Mutable run state threaded through the bridge loop.
///
/// One instance exists per run, owned by the loop; nothing else mutates
/// it. A snapshot of the whole struct becomes a status row after each
/// completed step, so the field set matches the recorded columns.
#[derive(Debug, Clone, Default)]
pub struct RunStatus {
    /// Completed iterations.
    pub iter_total: u64,
    /// Iterations that missed the soft wall-clock deadline.
    pub iter_fail: u64,
    /// Handshake counter the current step settled on.
    pub kr: i64,
    /// Step index, 1-based once the first read commits.
    pub k: u64,
    /// Coupling bus voltage written to the hardware this step, per-unit.
    pub v: f64,
    /// System frequency written to the hardware this step, per-unit.
    pub freq: f64,
    /// Active power injected this step, per-unit.
    pub p: f64,
    /// Reactive power injected this step, per-unit.
    pub q: f64,
    /// Fallback active power after this step, per-unit.
    pub p_def: f64,
    /// Fallback reactive power after this step, per-unit.
    pub q_def: f64,
    /// Wall-clock seconds spent writing the outbound frame.
    pub tw: f64,
    /// Wall-clock seconds spent acquiring the handshake read.
    pub tr: f64,
    /// Wall-clock seconds spent inside the simulator advance.
    pub tsim: f64,
    /// Simulated end time reached, seconds.
    pub tf: f64,
}

impl RunStatus {
    /// Fresh zeroed state for a new run.
    pub fn new() -> Self {
        Self::default()
    }
}

/// One recorded row of the status table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    /// Handshake counter for the step.
    pub kr: i64,
    /// Step index.
    pub k: u64,
    /// Voltage written, per-unit.
    pub v: f64,
    /// Frequency written, per-unit.
    pub freq: f64,
    /// Active power injected, per-unit.
    pub p: f64,
    /// Reactive power injected, per-unit.
    pub q: f64,
    /// Fallback active power, per-unit.
    pub p_def: f64,
    /// Fallback reactive power, per-unit.
    pub q_def: f64,
    /// Write time, seconds.
    pub tw: f64,
    /// Read time, seconds.
    pub tr: f64,
    /// Simulator time, seconds.
    pub tsim: f64,
    /// Simulated end time, seconds.
    pub tf: f64,
    /// Total step wall time, `tr + tw + tsim`.
    pub tall: f64,
}

impl StatusRow {
    fn from_status(status: &RunStatus) -> Self {
        Self {
            kr: status.kr,
            k: status.k,
            v: status.v,
            freq: status.freq,
            p: status.p,
            q: status.q,
            p_def: status.p_def,
            q_def: status.q_def,
            tw: status.tw,
            tr: status.tr,
            tsim: status.tsim,
            tf: status.tf,
            tall: status.tr + status.tw + status.tsim,
        }
    }
}

/// Collects one status row per completed step.
///
/// Preallocated for the planned horizon; a run that terminates early simply
/// leaves the remaining capacity unused, so the finalized table holds
/// exactly the completed iterations.
#[derive(Debug)]
pub struct StatusRecorder {
    rows: Vec<StatusRow>,
}

impl StatusRecorder {
    /// Preallocate for the planned number of steps.
    pub fn new(steps_planned: u64) -> Self {
        Self {
            rows: Vec::with_capacity(steps_planned as usize),
        }
    }

    /// Snapshot the run state as the row for the step just completed.
    pub fn record(&mut self, status: &RunStatus) {
        self.rows.push(StatusRow::from_status(status));
    }

    /// Rows recorded so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no step has completed yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Freeze the recording into an exportable table.
    pub fn finalize(self) -> StatusTable {
        StatusTable { rows: self.rows }
    }
}

/// Finalized per-step table of a run.
#[derive(Debug, Clone)]
pub struct StatusTable {
    rows: Vec<StatusRow>,
}

impl StatusTable {
    /// Column names in export order.
    pub const COLUMNS: [&'static str; 13] = [
        "kr", "k", "v", "freq", "p", "q", "p_def", "q_def", "tw", "tr", "tsim", "tf", "tall",
    ];

    /// Recorded rows in step order.
    pub fn rows(&self) -> &[StatusRow] {
        &self.rows
    }

    /// Number of completed steps.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Mean wall-clock spend per phase across all rows, keyed in column
    /// order. Zeroes when the table is empty.
    pub fn mean_timings(&self) -> IndexMap<String, f64> {
        let mut means = IndexMap::new();
        let count = self.rows.len() as f64;
        for name in ["tr", "tw", "tsim", "tall"] {
            means.insert(name.to_owned(), 0.0);
        }
        if self.rows.is_empty() {
            return means;
        }
        means["tr"] = self.rows.iter().map(|r| r.tr).sum::<f64>() / count;
        means["tw"] = self.rows.iter().map(|r| r.tw).sum::<f64>() / count;
        means["tsim"] = self.rows.iter().map(|r| r.tsim).sum::<f64>() / count;
        means["tall"] = self.rows.iter().map(|r| r.tall).sum::<f64>() / count;
        means
    }

    /// Write the table as headed CSV at `path`.
    ///
    /// The header is written even for an aborted run with zero rows.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(Self::COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
