//! Liveness stage - the probe pipeline step end to end.
//!
//! Consults the stage cache, loads and dedups candidates from the input
//! artifacts, dispatches them to workers, merges the worker reports and
//! writes the run artifact plus the diagnostics log of UNKNOWN and SKIPPED
//! URLs.

use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::error::{StageError, StageResult, StorageError};
use crate::merge::{merge_reports, to_candidate, MergeOrder, MergedReports};
use crate::prober::{Fetcher, ProbeConfig, Prober, RateLimiter, SkipRules};
use crate::stage::{Stage, StageCache, StageDecision};
use crate::storage::{
    default_diagnostics_path, read_lines, write_diagnostics_log, write_lines_atomic, RunSummary,
};
use crate::types::UrlRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tuning shared by every liveness run.
#[derive(Debug, Clone)]
pub struct LivenessOptions {
    pub probe: ProbeConfig,
    /// Number of chunks (and workers).
    pub chunks: usize,
    /// Global requests per second across workers, 0 for unlimited.
    pub rate: u32,
    pub order: MergeOrder,
    pub skip: SkipRules,
    /// Skip paths with repeated identical non-alive outcomes within a worker.
    pub suppress_repeated: bool,
    pub html_dump_dir: Option<PathBuf>,
    /// Show a progress bar while probing.
    pub progress: bool,
}

impl Default for LivenessOptions {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            chunks: 4,
            rate: 0,
            order: MergeOrder::default(),
            skip: SkipRules::default(),
            suppress_repeated: false,
            html_dump_dir: None,
            progress: false,
        }
    }
}

/// One invocation of the liveness stage.
#[derive(Debug, Clone)]
pub struct LivenessJob {
    /// Stage name used for caching, forcing and errors.
    pub name: String,
    pub inputs: Vec<PathBuf>,
    /// Run artifact; without one the stage is never cached.
    pub output: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    /// UNKNOWN and SKIPPED log; defaults to `<output>.unknown.jsonl`.
    pub diagnostics: Option<PathBuf>,
    pub options: LivenessOptions,
}

impl LivenessJob {
    pub fn new(name: impl Into<String>, inputs: Vec<PathBuf>, output: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            inputs,
            output,
            scratch_dir: None,
            diagnostics: None,
            options: LivenessOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LivenessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    pub fn with_diagnostics(mut self, path: Option<PathBuf>) -> Self {
        self.diagnostics = path;
        self
    }

    /// The cache view of this job, when it has an output.
    pub fn stage(&self) -> Option<Stage> {
        self.output.as_ref().map(|output| {
            Stage::new(self.name.clone())
                .with_inputs(self.inputs.iter().cloned())
                .with_output(output.clone())
                .with_scratch_dir(self.scratch_dir.clone())
        })
    }

    fn diagnostics_path(&self) -> Option<PathBuf> {
        self.diagnostics
            .clone()
            .or_else(|| self.output.as_deref().map(default_diagnostics_path))
    }
}

/// A completed liveness run.
#[derive(Debug, Clone)]
pub struct LivenessRun {
    pub merged: MergedReports,
    pub summary: RunSummary,
}

/// What `run_liveness` did.
#[derive(Debug, Clone)]
pub enum LivenessOutcome {
    /// The artifact already existed; nothing was probed.
    Skipped,
    Completed(LivenessRun),
}

/// Run the liveness stage for `job`.
pub async fn run_liveness<F: Fetcher + 'static>(
    job: &LivenessJob,
    fetcher: Arc<F>,
    cache: &StageCache,
    cancel: CancellationToken,
) -> StageResult<LivenessOutcome> {
    if let Some(stage) = job.stage() {
        if cache.decide(&stage)? == StageDecision::Skip {
            info!(stage = %job.name, "output present, skipping liveness probe");
            return Ok(LivenessOutcome::Skipped);
        }
    }

    let records = load_candidates(job)?;
    if records.is_empty() {
        return Err(StageError::EmptyInput {
            stage: job.name.clone(),
        });
    }
    info!(stage = %job.name, candidates = records.len(), chunks = job.options.chunks, "probing");

    let options = &job.options;
    let prober = Prober::new(fetcher, options.probe.clone())
        .with_rate_limiter(RateLimiter::per_second(options.rate));

    let progress = options.progress.then(|| progress_bar(records.len() as u64));
    let dispatch_options = DispatchOptions::default()
        .with_chunks(options.chunks)
        .with_skip_rules(options.skip.clone())
        .with_suppress_repeated(options.suppress_repeated)
        .with_html_dump_dir(options.html_dump_dir.clone())
        .with_progress(progress.clone());

    let summary = RunSummary::new(records.len()).with_output(job.output.clone());
    let dispatcher = Dispatcher::new(Arc::new(prober), dispatch_options, cancel);
    let workers = dispatcher.run(records).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let workers = workers?;

    let failed: Vec<usize> = workers
        .iter()
        .filter(|w| w.status.is_failed())
        .map(|w| w.ordinal)
        .collect();
    if !failed.is_empty() {
        for worker in workers.iter().filter(|w| w.status.is_failed()) {
            warn!(stage = %job.name, ordinal = worker.ordinal, status = %worker.status, "worker failed");
        }
        return Err(StageError::WorkersFailed {
            stage: job.name.clone(),
            workers: failed,
        });
    }

    let summary = summary.finalize(&workers);
    let merged = merge_reports(workers, options.order);

    if let Some(ref output) = job.output {
        write_lines_atomic(output, &merged.alive)?;
        debug!(path = %output.display(), alive = merged.alive.len(), "wrote run artifact");
    }
    if let Some(path) = job.diagnostics_path() {
        write_diagnostics_log(&path, &merged.unresolved, &merged.skipped)?;
    }

    Ok(LivenessOutcome::Completed(LivenessRun { merged, summary }))
}

/// Read every input, convert lines to candidates and drop repeats.
fn load_candidates(job: &LivenessJob) -> StageResult<Vec<UrlRecord>> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for path in &job.inputs {
        let lines = read_lines(path).map_err(|e| match e {
            StorageError::NotFound(path) => StageError::MissingInput {
                stage: job.name.clone(),
                path,
            },
            other => StageError::Storage(other),
        })?;

        for line in lines {
            let Some(candidate) = to_candidate(&line) else {
                warn!(path = %path.display(), line = %line, "ignoring invalid input line");
                continue;
            };
            if !seen.insert(candidate.clone()) {
                continue;
            }
            match UrlRecord::parse(&candidate) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = %line, error = %e, "ignoring invalid input line"),
            }
        }
    }

    Ok(records)
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}
