//! Chunk dispatcher - shards a URL list across concurrent workers.
//!
//! The list is cut into contiguous chunks by line count; each chunk is owned
//! by one tokio task that probes its URLs sequentially with its own pacer.
//! Workers hand their reports back through their join handles; the only
//! shared state is the HTML dump's set of saved bodies. `run` returns only
//! after every worker has terminated.

use crate::error::DispatchError;
use crate::prober::{FailureTracker, Fetcher, ProbeReport, Prober, SkipReason, SkipRules};
use crate::storage::HtmlDump;
use crate::types::UrlRecord;
use futures::future::join_all;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

/// A contiguous slice of the input assigned to one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T = UrlRecord> {
    /// Position of the chunk among its siblings.
    pub ordinal: usize,
    /// Input index of the chunk's first item.
    pub offset: usize,
    pub items: Vec<T>,
}

impl<T> Chunk<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Split `items` into `count` contiguous chunks by line count.
///
/// Chunk sizes differ by at most one, earlier chunks take the remainder.
/// A count of 0 or 1 yields a single chunk, a count above the number of
/// items yields one chunk per item and an empty input yields no chunk.
/// Items are never reordered, merged or dropped.
pub fn partition<T>(items: Vec<T>, count: usize) -> Vec<Chunk<T>> {
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let count = count.clamp(1, total);
    let base = total / count;
    let extra = total % count;

    let mut chunks = Vec::with_capacity(count);
    let mut rest = items.into_iter();
    let mut offset = 0;

    for ordinal in 0..count {
        let size = base + usize::from(ordinal < extra);
        let chunk_items: Vec<T> = rest.by_ref().take(size).collect();
        chunks.push(Chunk {
            ordinal,
            offset,
            items: chunk_items,
        });
        offset += size;
    }

    chunks
}

/// Terminal state of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Every URL of the chunk was handled.
    Completed,
    /// Stopped early because of cancellation.
    Cancelled,
    /// Stopped because of an error or a panic.
    Failed(String),
}

impl WorkerStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// A probe report tagged with the input index of its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedReport {
    pub index: usize,
    pub report: ProbeReport,
}

/// A candidate a worker did not probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUrl {
    /// Input index of the URL.
    pub index: usize,
    pub url: String,
    pub reason: SkipReason,
}

/// Everything one worker produced.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub ordinal: usize,
    /// Number of URLs in the worker's chunk.
    pub size: usize,
    pub status: WorkerStatus,
    pub reports: Vec<IndexedReport>,
    /// URLs not probed because of skip rules or failure suppression.
    pub skipped: Vec<SkippedUrl>,
}

/// Options for a dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Requested number of chunks (and workers).
    pub chunks: usize,
    pub skip: Arc<SkipRules>,
    /// Skip a path after repeated identical non-alive outcomes. Tracking is
    /// per worker, so the result then depends on the chunk count.
    pub suppress_repeated: bool,
    /// Directory receiving the HTML of alive pages.
    pub html_dump_dir: Option<PathBuf>,
    /// Progress bar advanced once per handled URL.
    pub progress: Option<ProgressBar>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            chunks: 4,
            skip: Arc::new(SkipRules::default()),
            suppress_repeated: false,
            html_dump_dir: None,
            progress: None,
        }
    }
}

impl DispatchOptions {
    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn with_skip_rules(mut self, skip: SkipRules) -> Self {
        self.skip = Arc::new(skip);
        self
    }

    pub fn with_suppress_repeated(mut self, enabled: bool) -> Self {
        self.suppress_repeated = enabled;
        self
    }

    pub fn with_html_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.html_dump_dir = dir;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }
}

/// Runs one prober worker per chunk and joins them.
pub struct Dispatcher<F> {
    prober: Arc<Prober<F>>,
    options: DispatchOptions,
    cancel: CancellationToken,
}

impl<F: Fetcher + 'static> Dispatcher<F> {
    pub fn new(prober: Arc<Prober<F>>, options: DispatchOptions, cancel: CancellationToken) -> Self {
        Self {
            prober,
            options,
            cancel,
        }
    }

    /// Probe `records` across the configured number of workers.
    ///
    /// Returns one report per worker, ordered by chunk ordinal, once all
    /// workers have terminated. A cancelled token turns the run into
    /// [`DispatchError::Interrupted`] after the workers have stopped.
    pub async fn run(&self, records: Vec<UrlRecord>) -> Result<Vec<WorkerReport>, DispatchError> {
        let chunks = partition(records, self.options.chunks);
        debug!(workers = chunks.len(), "dispatching chunks");
        let dump = self.options.html_dump_dir.clone().map(HtmlDump::new);

        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                let ordinal = chunk.ordinal;
                let size = chunk.len();
                let worker = Worker {
                    prober: Arc::clone(&self.prober),
                    skip: Arc::clone(&self.options.skip),
                    suppress_repeated: self.options.suppress_repeated,
                    dump: dump.clone(),
                    progress: self.options.progress.clone(),
                    cancel: self.cancel.clone(),
                };
                let span = info_span!("worker", ordinal);
                (ordinal, size, tokio::spawn(worker.run(chunk).instrument(span)))
            })
            .collect();

        let joined = join_all(handles.into_iter().map(|(ordinal, size, handle)| async move {
            match handle.await {
                Ok(report) => report,
                Err(e) => {
                    warn!(ordinal, error = %e, "worker aborted");
                    WorkerReport {
                        ordinal,
                        size,
                        status: WorkerStatus::Failed(e.to_string()),
                        reports: Vec::new(),
                        skipped: Vec::new(),
                    }
                }
            }
        }))
        .await;

        if self.cancel.is_cancelled() {
            return Err(DispatchError::Interrupted);
        }

        Ok(joined)
    }
}

/// State owned by a single worker task.
struct Worker<F> {
    prober: Arc<Prober<F>>,
    skip: Arc<SkipRules>,
    suppress_repeated: bool,
    dump: Option<HtmlDump>,
    progress: Option<ProgressBar>,
    cancel: CancellationToken,
}

impl<F: Fetcher + 'static> Worker<F> {
    async fn run(self, chunk: Chunk) -> WorkerReport {
        let size = chunk.len();
        let mut pacer = self.prober.config().pacer();
        let mut tracker = FailureTracker::new();
        let mut reports = Vec::with_capacity(size);
        let mut skipped = Vec::new();
        let mut status = WorkerStatus::Completed;

        for (i, record) in chunk.items.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                status = WorkerStatus::Cancelled;
                break;
            }

            let skip_reason = self.skip.check(&record).or_else(|| {
                (self.suppress_repeated && tracker.is_suppressed(&record))
                    .then_some(SkipReason::RepeatedFailure)
            });
            if let Some(reason) = skip_reason {
                debug!(url = record.as_str(), %reason, "skipped");
                skipped.push(SkippedUrl {
                    index: chunk.offset + i,
                    url: record.as_str().to_string(),
                    reason,
                });
                self.advance();
                continue;
            }

            let (report, page) = tokio::select! {
                _ = self.cancel.cancelled() => {
                    status = WorkerStatus::Cancelled;
                    break;
                }
                probed = self.prober.probe_with_page(&record, &mut pacer) => probed,
            };

            if self.suppress_repeated {
                tracker.observe(&record, report.label(), report.is_alive());
            }

            if let (Some(dump), Some(page)) = (self.dump.as_ref(), page.as_ref()) {
                if report.is_alive() {
                    if let Err(e) = dump.save(&record, &page.body) {
                        status = WorkerStatus::Failed(e.to_string());
                        break;
                    }
                }
            }

            if let Some(ref progress) = self.progress {
                if report.is_alive() {
                    progress.set_message(format!("alive: {}", record.as_str()));
                }
            }
            self.advance();

            reports.push(IndexedReport {
                index: chunk.offset + i,
                report,
            });
        }

        debug!(
            handled = reports.len(),
            skipped = skipped.len(),
            suppressed_paths = tracker.suppressed_count(),
            %status,
            "worker finished"
        );

        WorkerReport {
            ordinal: chunk.ordinal,
            size,
            status,
            reports,
            skipped,
        }
    }

    fn advance(&self) {
        if let Some(ref progress) = self.progress {
            progress.inc(1);
        }
    }
}
