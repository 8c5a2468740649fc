//! Run subcommand implementation.
//!
//! Handles `urlsift run <target>`: the whole pipeline, skipping stages whose
//! outputs already exist.

use super::tuning::TuningArgs;
use super::{Context, PipelineArgs};
use crate::error::CliResult;
use crate::output;
use crate::pipeline::PipelineRunner;
use crate::prober::HttpFetcher;
use crate::stage::{ForcePolicy, StageCache};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the recon pipeline for a target.
#[derive(Parser, Debug)]
pub struct RunCommand {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Rerun every stage
    #[arg(long)]
    pub force: bool,

    /// Rerun the named stage (repeatable)
    #[arg(long = "force-stage", value_name = "NAME")]
    pub force_stages: Vec<String>,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(&self, ctx: &Context, cancel: CancellationToken) -> CliResult<()> {
        let target = self.pipeline.target()?;
        let workdir = self.pipeline.workdir(&ctx.settings);
        let definition = self.pipeline.definition()?;
        let options = self
            .tuning
            .liveness_options(&ctx.settings, ctx.show_progress())?;
        let force = ForcePolicy::from_flags(self.force, self.force_stages.iter().cloned());

        let fetcher = Arc::new(HttpFetcher::new(options.probe.timeout)?);
        let runner = PipelineRunner::new(target, &workdir, definition, fetcher)?
            .with_cache(StageCache::new(force))?
            .with_liveness_options(options)
            .with_console(!ctx.quiet);

        if !ctx.quiet {
            output::print_info(&format!(
                "{} stages for {} in {}",
                runner.definition().stages.len(),
                runner.layout().target,
                runner.layout().root.display()
            ));
        }

        let report = runner.run(cancel).await;
        if !ctx.quiet {
            output::print_pipeline_report(&report);
        }

        match report.error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
