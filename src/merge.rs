//! Merge and dedup of line sets and worker reports.

use crate::dispatch::{SkippedUrl, WorkerReport};
use crate::prober::{ProbeReport, ProbeResult, Unresolved};
use crate::types::UrlRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Ordering of the alive URLs in a run artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MergeOrder {
    /// Sorted by byte value.
    #[default]
    Lexical,
    /// First occurrence in the input.
    Input,
}

/// Union of line sets, sorted lexically, every line once.
///
/// Lines are trimmed and blank lines dropped.
pub fn merge_lines<I, L, S>(sets: I) -> Vec<String>
where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let merged: BTreeSet<String> = sets
        .into_iter()
        .flatten()
        .map(|l| l.as_ref().trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    merged.into_iter().collect()
}

/// Worker reports merged into input order.
#[derive(Debug, Clone, Default)]
pub struct MergedReports {
    /// Every resolved URL, ordered by input index.
    pub results: Vec<ProbeResult>,
    /// URLs that exhausted their attempts, ordered by input index.
    pub unresolved: Vec<Unresolved>,
    /// URLs that were never probed, ordered by input index.
    pub skipped: Vec<SkippedUrl>,
    /// The run artifact: distinct alive URLs in the requested order.
    pub alive: Vec<String>,
}

/// Merge worker reports.
///
/// Reports are ordered by the input index of their URL, so the outcome is
/// independent of the order in which workers finished.
pub fn merge_reports(workers: Vec<WorkerReport>, order: MergeOrder) -> MergedReports {
    let mut merged = MergedReports::default();
    let mut indexed = Vec::new();
    for worker in workers {
        indexed.extend(worker.reports);
        merged.skipped.extend(worker.skipped);
    }
    indexed.sort_by_key(|r| r.index);
    merged.skipped.sort_by_key(|s| s.index);

    for entry in indexed {
        match entry.report {
            ProbeReport::Resolved(result) => merged.results.push(result),
            ProbeReport::Exhausted(unresolved) => merged.unresolved.push(unresolved),
        }
    }
    merged.alive = alive_urls(&merged.results, order);
    merged
}

/// Distinct alive URLs of `results` (assumed in input order).
pub fn alive_urls(results: &[ProbeResult], order: MergeOrder) -> Vec<String> {
    let alive = results
        .iter()
        .filter(|r| r.classification.is_alive())
        .map(|r| r.url.clone());

    match order {
        MergeOrder::Lexical => alive.collect::<BTreeSet<_>>().into_iter().collect(),
        MergeOrder::Input => {
            let mut seen = HashSet::new();
            alive.filter(|u| seen.insert(u.clone())).collect()
        }
    }
}

/// Turn one upstream artifact line into a probe candidate URL.
///
/// Absolute http(s) URLs pass through unchanged. Otherwise the first token is
/// read as `host[:port]` (the shape of resolver and port-scanner output) and
/// given a scheme: https for ports 443 and 8443, http for anything else.
pub fn to_candidate(line: &str) -> Option<String> {
    let token = line.split_whitespace().next()?;

    let lowered = token.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return UrlRecord::parse(token).ok().map(|_| token.to_string());
    }
    if token.contains("://") || token.contains('/') {
        return None;
    }

    let candidate = match token.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().ok()?;
            if host.is_empty() {
                return None;
            }
            match port {
                443 | 8443 => format!("https://{}:{}", host, port),
                _ => format!("http://{}:{}", host, port),
            }
        }
        None => format!("http://{}", token),
    };

    UrlRecord::parse(&candidate).ok().map(|_| candidate)
}

/// Convert lines to candidates, keeping the first occurrence of each.
pub fn dedup_candidates<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter_map(|l| to_candidate(l.as_ref()))
        .filter(|c| seen.insert(c.clone()))
        .collect()
}
