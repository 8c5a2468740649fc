//! Probe subcommand implementation.
//!
//! Handles `urlsift probe -i <file>`: one liveness run outside any pipeline.

use super::tuning::TuningArgs;
use super::Context;
use crate::error::{CliError, CliResult};
use crate::liveness::{run_liveness, LivenessJob, LivenessOutcome};
use crate::output::{self, ReportFormat};
use crate::prober::HttpFetcher;
use crate::stage::{ForcePolicy, StageCache};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Classify every candidate URL and keep the alive ones.
#[derive(Parser, Debug)]
pub struct ProbeCommand {
    /// Newline-delimited candidate URLs
    #[arg(short = 'i', long, value_name = "PATH")]
    pub input: PathBuf,

    /// Additional candidate files, merged with the input
    #[arg(long = "extra-input", value_name = "PATH")]
    pub extra_inputs: Vec<PathBuf>,

    /// Write alive URLs here instead of stdout
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Probe again even if the output already exists
    #[arg(long)]
    pub force: bool,

    /// UNKNOWN log (default: <output>.unknown.jsonl)
    #[arg(long, value_name = "PATH")]
    pub diagnostics: Option<PathBuf>,

    /// Write a per-URL report
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Format of the per-URL report
    #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
    pub report_format: ReportFormat,

    /// Write the run summary as JSON
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

impl ProbeCommand {
    /// Execute the probe command.
    pub async fn execute(&self, ctx: &Context, cancel: CancellationToken) -> CliResult<()> {
        let options = self
            .tuning
            .liveness_options(&ctx.settings, ctx.show_progress())?;

        let mut inputs = vec![self.input.clone()];
        inputs.extend(self.extra_inputs.iter().cloned());

        if !ctx.quiet {
            let shown: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
            output::print_probe_header(
                &shown,
                options.chunks,
                options.probe.retries,
                options.probe.timeout.as_secs_f64(),
            );
        }

        let fetcher = Arc::new(HttpFetcher::new(options.probe.timeout)?);
        let job = LivenessJob::new("probe", inputs, self.output.clone())
            .with_diagnostics(self.diagnostics.clone())
            .with_options(options);
        let cache = StageCache::new(ForcePolicy::from_flags(self.force, Vec::<String>::new()));

        let run = match run_liveness(&job, fetcher, &cache, cancel).await? {
            LivenessOutcome::Skipped => {
                if !ctx.quiet {
                    output::print_info(&format!(
                        "{} already exists, skipping (use --force to probe again)",
                        self.output.as_deref().unwrap_or(Path::new("-")).display()
                    ));
                }
                return Ok(());
            }
            LivenessOutcome::Completed(run) => run,
        };

        if self.output.is_none() {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            for url in &run.merged.alive {
                writeln!(lock, "{}", url)
                    .map_err(|e| CliError::Other(format!("failed to write to stdout: {}", e)))?;
            }
        }

        if let Some(ref path) = self.report {
            output::write_report(path, &run.merged, self.report_format)?;
        }
        if let Some(ref path) = self.summary {
            run.summary.save(path)?;
        }

        if !ctx.quiet {
            output::print_run_summary(&run.summary);
        }
        Ok(())
    }
}
