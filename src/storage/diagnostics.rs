//! Diagnostics log of URLs without a verdict.
//!
//! URLs that exhausted their attempts (UNKNOWN) or were never probed
//! (SKIPPED) are kept out of the run artifact but recorded here, one JSON
//! object per line.

use super::artifact::{remove_file_if_exists, write_atomic};
use crate::error::StorageResult;
use crate::dispatch::SkippedUrl;
use crate::prober::{Unresolved, SKIPPED_LABEL, UNKNOWN_LABEL};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct DiagnosticEntry<'a> {
    url: &'a str,
    classification: &'static str,
    attempts: u32,
    reason: &'a str,
}

/// Default log location next to an artifact: `<output>.unknown.jsonl`.
pub fn default_diagnostics_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".unknown.jsonl");
    PathBuf::from(name)
}

/// Render unresolved then skipped URLs as JSON lines.
pub fn render_diagnostics(
    unresolved: &[Unresolved],
    skipped: &[SkippedUrl],
) -> StorageResult<String> {
    let unknown = unresolved.iter().map(|u| DiagnosticEntry {
        url: &u.url,
        classification: UNKNOWN_LABEL,
        attempts: u.attempts,
        reason: &u.reason,
    });
    let skipped = skipped.iter().map(|s| DiagnosticEntry {
        url: &s.url,
        classification: SKIPPED_LABEL,
        attempts: 0,
        reason: s.reason.as_str(),
    });

    let mut out = String::new();
    for entry in unknown.chain(skipped) {
        out.push_str(&serde_json::to_string(&entry)?);
        out.push('\n');
    }
    Ok(out)
}

/// Replace the log at `path`; with no entries a stale log is removed.
pub fn write_diagnostics_log(
    path: &Path,
    unresolved: &[Unresolved],
    skipped: &[SkippedUrl],
) -> StorageResult<()> {
    if unresolved.is_empty() && skipped.is_empty() {
        return remove_file_if_exists(path);
    }
    write_atomic(path, render_diagnostics(unresolved, skipped)?.as_bytes())
}
