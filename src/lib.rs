//! # urlsift - Recon Pipeline Runner and URL Liveness Prober
//!
//! urlsift sequences the stages of a reconnaissance pipeline for one target
//! and decides which candidate URLs are really alive.
//!
//! ## Features
//!
//! - **Incremental Stages**: a stage whose outputs exist is skipped; `--force`
//!   and `--force-stage` invalidate them
//! - **Chunked Probing**: candidates are split into contiguous chunks, each
//!   probed by its own worker
//! - **Soft-404 Detection**: titles are matched against a configurable
//!   keyword list, so "200 OK, page not found" is not counted as alive
//! - **Adaptive Pacing**: bounded retries, per-worker delay and backoff on
//!   challenge pages, optional global rate limit
//! - **Deterministic Output**: results are merged by input position, never by
//!   completion order
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use urlsift::liveness::{run_liveness, LivenessJob, LivenessOutcome};
//! use urlsift::prober::HttpFetcher;
//! use urlsift::stage::StageCache;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let job = LivenessJob::new("probe", vec!["candidates.txt".into()], Some("alive.txt".into()));
//!     let fetcher = Arc::new(HttpFetcher::new(std::time::Duration::from_secs(10))?);
//!
//!     if let LivenessOutcome::Completed(run) =
//!         run_liveness(&job, fetcher, &StageCache::default(), CancellationToken::new()).await?
//!     {
//!         println!("{}", run.summary.summary());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Targets, URL records, keyword sets and run IDs
//! - [`prober`] - Fetching, classification, pacing and skip rules
//! - [`dispatch`] - Chunk partitioning and the worker pool
//! - [`merge`] - Set merge of line artifacts and of worker reports
//! - [`stage`] - Stage descriptors and the stage cache
//! - [`liveness`] - The probe stage end to end
//! - [`pipeline`] - Pipeline runner and external stages
//! - [`config`] - Settings and pipeline definitions
//! - [`storage`] - Artifacts, diagnostics, HTML dumps and run summaries
//! - [`output`] - Console output and per-URL reports
//! - [`error`] - Error types per layer

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod prober;
pub mod stage;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, StageError};
pub use liveness::{run_liveness, LivenessJob, LivenessOptions, LivenessOutcome};
pub use pipeline::{PipelineReport, PipelineRunner};
pub use prober::{Classification, HttpFetcher, ProbeConfig, Prober};
pub use types::{KeywordSet, RunId, Target, UrlRecord};
