//! Stages subcommand implementation.

use super::{Context, PipelineArgs};
use crate::error::CliResult;
use crate::output;
use crate::stage::StageCache;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Show which pipeline stages are done and which would run.
#[derive(Parser, Debug)]
pub struct StagesCommand {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl StagesCommand {
    /// Execute the stages command.
    pub fn execute(&self, ctx: &Context) -> CliResult<()> {
        let layout = self.pipeline.layout(&ctx.settings)?;
        let definition = self.pipeline.definition()?;

        if !ctx.quiet {
            output::print_info(&format!("{} ({})", layout.target, layout.root.display()));
        }

        let plan = layout.plan(&definition, &StageCache::default());
        for (spec, (stage, decision)) in definition.stages.iter().zip(&plan) {
            let outputs: Vec<&Path> = stage.outputs.iter().map(PathBuf::as_path).collect();
            output::print_stage_state(&stage.name, spec.kind, *decision, &outputs);
        }
        Ok(())
    }
}
