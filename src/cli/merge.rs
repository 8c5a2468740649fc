//! Merge subcommand implementation.

use super::Context;
use crate::error::CliResult;
use crate::merge::{dedup_candidates, merge_lines};
use crate::output;
use crate::storage::{read_lines, write_lines_atomic};
use clap::Parser;
use std::path::PathBuf;

/// Merge line files into one sorted set without duplicates.
#[derive(Parser, Debug)]
pub struct MergeCommand {
    /// Merged output file
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: PathBuf,

    /// Files to merge
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Turn host and host:port lines into probe candidate URLs
    #[arg(long)]
    pub candidates: bool,
}

impl MergeCommand {
    /// Execute the merge command.
    pub fn execute(&self, ctx: &Context) -> CliResult<()> {
        let mut sets = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            sets.push(read_lines(input)?);
        }

        let mut merged = merge_lines(sets);
        if self.candidates {
            merged = merge_lines([dedup_candidates(&merged)]);
        }
        write_lines_atomic(&self.output, &merged)?;

        if !ctx.quiet {
            output::print_success(&format!(
                "{} lines from {} files written to {}",
                merged.len(),
                self.inputs.len(),
                self.output.display()
            ));
        }
        Ok(())
    }
}
