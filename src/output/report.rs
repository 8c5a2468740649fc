//! Per-URL reports in JSON or CSV.

use crate::error::{StorageError, StorageResult};
use crate::merge::MergedReports;
use crate::prober::{SKIPPED_LABEL, UNKNOWN_LABEL};
use crate::storage::write_atomic;
use serde::Serialize;
use std::path::Path;

/// Format of a per-URL report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// JSON array of objects
    #[default]
    Json,
    /// CSV with a header row
    Csv,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

const REPORT_COLUMNS: [&str; 6] = [
    "url",
    "classification",
    "status",
    "title",
    "attempts",
    "diagnostic",
];

/// One report row; unresolved and skipped URLs have no status or title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow<'a> {
    pub url: &'a str,
    pub classification: &'a str,
    pub status: Option<u16>,
    pub title: Option<&'a str>,
    pub attempts: u32,
    pub diagnostic: Option<&'a str>,
}

/// Rows for every candidate URL: resolved first, then unresolved, then
/// skipped, each in input order.
pub fn report_rows(merged: &MergedReports) -> Vec<ReportRow<'_>> {
    let resolved = merged.results.iter().map(|r| ReportRow {
        url: &r.url,
        classification: r.classification.as_str(),
        status: Some(r.status),
        title: r.title.as_deref(),
        attempts: r.attempts,
        diagnostic: r.diagnostic.as_deref(),
    });
    let unresolved = merged.unresolved.iter().map(|u| ReportRow {
        url: &u.url,
        classification: UNKNOWN_LABEL,
        status: None,
        title: None,
        attempts: u.attempts,
        diagnostic: Some(&u.reason),
    });
    let skipped = merged.skipped.iter().map(|s| ReportRow {
        url: &s.url,
        classification: SKIPPED_LABEL,
        status: None,
        title: None,
        attempts: 0,
        diagnostic: Some(s.reason.as_str()),
    });
    resolved.chain(unresolved).chain(skipped).collect()
}

/// Render a report in `format`.
pub fn render_report(merged: &MergedReports, format: ReportFormat) -> StorageResult<Vec<u8>> {
    let rows = report_rows(merged);
    match format {
        ReportFormat::Json => Ok(serde_json::to_vec_pretty(&rows)?),
        ReportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(Vec::new());
            // An empty report still carries the header.
            if rows.is_empty() {
                wtr.write_record(REPORT_COLUMNS)?;
            }
            for row in &rows {
                wtr.serialize(row)?;
            }
            wtr.into_inner()
                .map_err(|e| StorageError::Serialize(e.to_string()))
        }
    }
}

/// Write a report file atomically.
pub fn write_report(
    path: &Path,
    merged: &MergedReports,
    format: ReportFormat,
) -> StorageResult<()> {
    write_atomic(path, &render_report(merged, format)?)
}
