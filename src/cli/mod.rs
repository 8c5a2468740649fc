//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `urlsift probe -i <file>` - Probe a candidate list
//! - `urlsift run <target>` - Run the recon pipeline for a target
//! - `urlsift stages <target>` - Show which stages would run
//! - `urlsift merge -o <file> <inputs>...` - Merge and dedup line files

mod merge;
mod probe;
mod run;
mod stages;
mod tuning;

pub use merge::MergeCommand;
pub use probe::ProbeCommand;
pub use run::RunCommand;
pub use stages::StagesCommand;
pub use tuning::TuningArgs;

use crate::config::{AppSettings, Paths, PipelineDefinition};
use crate::error::{CliError, CliResult, PipelineError};
use crate::pipeline::TargetLayout;
use crate::types::Target;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// urlsift - recon pipeline runner and URL liveness prober.
///
/// Probes candidate URLs with bounded retries and adaptive pacing, separates
/// alive pages from real and soft 404s, and only reruns the pipeline stages
/// whose outputs are missing.
#[derive(Parser, Debug)]
#[command(name = "urlsift")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recon pipeline runner and URL liveness prober", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe candidate URLs and keep the alive ones
    #[command(alias = "p")]
    Probe(ProbeCommand),

    /// Run the recon pipeline for a target
    #[command(alias = "r")]
    Run(RunCommand),

    /// Show the cache state of every pipeline stage
    Stages(StagesCommand),

    /// Merge line files into a sorted, deduplicated set
    #[command(alias = "m")]
    Merge(MergeCommand),
}

/// State shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: AppSettings,
    pub verbose: bool,
    pub quiet: bool,
}

impl Context {
    pub fn new(settings: AppSettings, verbose: bool, quiet: bool) -> Self {
        Self {
            settings,
            verbose,
            quiet,
        }
    }

    /// A progress bar only makes sense on a terminal without debug logs.
    pub fn show_progress(&self) -> bool {
        !self.verbose && !self.quiet && console::Term::stderr().is_term()
    }
}

/// Target and pipeline selection shared by `run` and `stages`.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Target domain, e.g. example.com
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Root of per-target output directories (default from settings)
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Pipeline definition file (JSON)
    #[arg(long, value_name = "PATH")]
    pub pipeline: Option<PathBuf>,
}

impl PipelineArgs {
    pub fn target(&self) -> CliResult<Target> {
        Target::parse(&self.target)
            .map_err(|e| CliError::from(PipelineError::InvalidTarget(e.to_string())))
    }

    pub fn workdir(&self, settings: &AppSettings) -> PathBuf {
        self.workdir
            .clone()
            .unwrap_or_else(|| settings.workdir.clone())
    }

    /// The explicit definition, else the user's `pipeline.json`, else the
    /// built-in chain.
    pub fn definition(&self) -> CliResult<PipelineDefinition> {
        if let Some(ref path) = self.pipeline {
            return Ok(PipelineDefinition::load(path)?);
        }

        if let Ok(paths) = Paths::resolve() {
            let file = paths.pipeline_file();
            if file.exists() {
                tracing::debug!(path = %file.display(), "using user pipeline");
                return Ok(PipelineDefinition::load(&file)?);
            }
        }

        Ok(PipelineDefinition::default())
    }

    pub fn layout(&self, settings: &AppSettings) -> CliResult<TargetLayout> {
        Ok(TargetLayout::new(self.target()?, &self.workdir(settings)))
    }
}
