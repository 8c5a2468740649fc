//! Persisted summary of one liveness run.

use super::artifact::write_atomic;
use crate::dispatch::WorkerReport;
use crate::error::{StorageError, StorageResult};
use crate::prober::{Classification, ProbeReport};
use crate::types::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-worker line of a run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub ordinal: usize,
    /// URLs assigned to the worker.
    pub size: usize,
    /// URLs probed to a final report.
    pub handled: usize,
    pub skipped: usize,
    pub status: String,
}

/// A liveness run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique identifier for this run.
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Distinct candidate URLs after loading the inputs.
    pub candidates: usize,
    pub alive: usize,
    pub soft_not_found: usize,
    pub real_not_found: usize,
    pub unknown: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<PathBuf>,
    pub workers: Vec<WorkerSummary>,
}

impl RunSummary {
    /// Start a summary for `candidates` URLs.
    pub fn new(candidates: usize) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            started_at: now,
            completed_at: now,
            candidates,
            alive: 0,
            soft_not_found: 0,
            real_not_found: 0,
            unknown: 0,
            skipped: 0,
            duration_ms: 0,
            output: None,
            workers: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Count the worker reports and stamp the completion time.
    pub fn finalize(mut self, workers: &[WorkerReport]) -> Self {
        self.completed_at = Utc::now();
        self.duration_ms = (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;

        for worker in workers {
            for indexed in &worker.reports {
                match &indexed.report {
                    ProbeReport::Resolved(r) => match r.classification {
                        Classification::Alive => self.alive += 1,
                        Classification::SoftNotFound => self.soft_not_found += 1,
                        Classification::RealNotFound => self.real_not_found += 1,
                    },
                    ProbeReport::Exhausted(_) => self.unknown += 1,
                }
            }
            self.skipped += worker.skipped.len();
            self.workers.push(WorkerSummary {
                ordinal: worker.ordinal,
                size: worker.size,
                handled: worker.reports.len(),
                skipped: worker.skipped.len(),
                status: worker.status.to_string(),
            });
        }

        self
    }

    /// URLs that received a final report.
    pub fn probed(&self) -> usize {
        self.alive + self.soft_not_found + self.real_not_found + self.unknown
    }

    /// One-line summary for the console.
    pub fn summary(&self) -> String {
        format!(
            "{} alive, {} soft 404, {} real 404, {} unknown, {} skipped of {} [{:.2}s]",
            self.alive,
            self.soft_not_found,
            self.real_not_found,
            self.unknown,
            self.skipped,
            self.candidates,
            self.duration_ms as f64 / 1000.0
        )
    }

    /// Write the summary as pretty JSON.
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes())
    }

    pub fn load(path: &Path) -> StorageResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| StorageError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
