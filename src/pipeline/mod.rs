//! Pipeline runner - sequences the stages of one target.
//!
//! Every stage path is resolved under `<workdir>/<target>/`, each stage gets
//! `raw/<stage>/` as scratch space, and the stage cache decides what runs.
//! The runner stops at the first failed stage.

pub mod external;

use crate::config::{PipelineDefinition, StageKind, StageSpec};
use crate::error::{PipelineError, PipelineResult, StageError, StageResult, StorageError};
use crate::liveness::{run_liveness, LivenessJob, LivenessOptions, LivenessOutcome};
use crate::merge::merge_lines;
use crate::output;
use crate::prober::Fetcher;
use crate::stage::{ForcePolicy, Stage, StageCache, StageDecision};
use crate::storage::{read_lines, write_lines_atomic, RunSummary};
use crate::types::Target;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use external::{shell_quote, Placeholders};

/// How a stage ended.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Outputs were already present.
    Skipped,
    /// Ran to completion; `lines` counts the first output.
    Completed {
        lines: usize,
        summary: Option<RunSummary>,
    },
    Failed(String),
}

/// Per-stage line of a pipeline report.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub kind: StageKind,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

/// Result of running a pipeline.
#[derive(Debug)]
pub struct PipelineReport {
    pub target: Target,
    pub root: PathBuf,
    pub stages: Vec<StageReport>,
    /// The error that stopped the pipeline.
    pub error: Option<StageError>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Where the stages of one target live: `<workdir>/<target>/`.
#[derive(Debug, Clone)]
pub struct TargetLayout {
    pub target: Target,
    pub root: PathBuf,
}

impl TargetLayout {
    pub fn new(target: Target, workdir: &Path) -> Self {
        let root = workdir.join(target.dir_name());
        Self { target, root }
    }

    /// The cache view of `spec` with paths resolved under the target root.
    pub fn resolve(&self, spec: &StageSpec) -> Stage {
        Stage::new(spec.name.clone())
            .with_inputs(spec.inputs.iter().map(|p| self.root.join(p)))
            .with_outputs(spec.outputs.iter().map(|p| self.root.join(p)))
            .with_scratch_dir(Some(self.root.join("raw").join(&spec.name)))
    }

    /// What each stage would do now, without side effects.
    pub fn plan(
        &self,
        definition: &PipelineDefinition,
        cache: &StageCache,
    ) -> Vec<(Stage, StageDecision)> {
        definition
            .stages
            .iter()
            .map(|spec| {
                let stage = self.resolve(spec);
                let decision = cache.peek(&stage);
                (stage, decision)
            })
            .collect()
    }
}

/// Runs a pipeline definition for one target.
pub struct PipelineRunner<F> {
    layout: TargetLayout,
    definition: PipelineDefinition,
    cache: StageCache,
    liveness: LivenessOptions,
    fetcher: Arc<F>,
    quiet: bool,
}

impl<F: Fetcher + 'static> PipelineRunner<F> {
    /// Create a runner rooted at `<workdir>/<target>/`.
    pub fn new(
        target: Target,
        workdir: &Path,
        definition: PipelineDefinition,
        fetcher: Arc<F>,
    ) -> PipelineResult<Self> {
        definition.validate()?;

        Ok(Self {
            layout: TargetLayout::new(target, workdir),
            definition,
            cache: StageCache::default(),
            liveness: LivenessOptions::default(),
            fetcher,
            quiet: true,
        })
    }

    /// Use `cache`; every stage it forces by name must exist.
    pub fn with_cache(mut self, cache: StageCache) -> PipelineResult<Self> {
        if let ForcePolicy::Only(names) = cache.force_policy() {
            if let Some(unknown) = names.iter().find(|n| self.definition.stage(n).is_none()) {
                return Err(PipelineError::UnknownStage(unknown.clone()));
            }
        }
        self.cache = cache;
        Ok(self)
    }

    pub fn with_liveness_options(mut self, options: LivenessOptions) -> Self {
        self.liveness = options;
        self
    }

    /// Print stage progress to the console.
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.quiet = !enabled;
        self
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Run every stage in order, stopping at the first failure.
    pub async fn run(&self, cancel: CancellationToken) -> PipelineReport {
        let mut report = PipelineReport {
            target: self.layout.target.clone(),
            root: self.layout.root.clone(),
            stages: Vec::with_capacity(self.definition.stages.len()),
            error: None,
        };
        let total = self.definition.stages.len();

        for (i, spec) in self.definition.stages.iter().enumerate() {
            if !self.quiet {
                output::print_stage_start(i + 1, total, &spec.name, spec.kind);
            }

            let started = Instant::now();
            let result = if cancel.is_cancelled() {
                Err(StageError::Interrupted)
            } else {
                self.run_stage(spec, &cancel).await
            };

            let (outcome, error) = match result {
                Ok(outcome) => (outcome, None),
                Err(e) => (StageOutcome::Failed(e.to_string()), Some(e)),
            };
            let stage_report = StageReport {
                name: spec.name.clone(),
                kind: spec.kind,
                outcome,
                elapsed: started.elapsed(),
            };
            if !self.quiet {
                output::print_stage_result(&stage_report);
            }
            report.stages.push(stage_report);

            if error.is_some() {
                report.error = error;
                break;
            }
        }

        report
    }

    async fn run_stage(
        &self,
        spec: &StageSpec,
        cancel: &CancellationToken,
    ) -> StageResult<StageOutcome> {
        let stage = self.layout.resolve(spec);

        if spec.kind == StageKind::Probe {
            return self.run_probe(&stage, cancel).await;
        }

        if self.cache.decide(&stage)? == StageDecision::Skip {
            info!(stage = %stage.name, "outputs present, skipping");
            return Ok(StageOutcome::Skipped);
        }

        if let Some(missing) = stage.missing_inputs().first() {
            return Err(StageError::MissingInput {
                stage: stage.name.clone(),
                path: missing.to_path_buf(),
            });
        }

        // Validation pairs commands with external stages only.
        match spec.command.as_deref() {
            Some(template) => {
                let command = Placeholders {
                    target: &self.layout.target,
                    stage: &stage,
                }
                .render(template);
                external::run_command(&stage, &command, &self.layout.root, cancel).await?;
            }
            None => self.run_merge(&stage)?,
        }

        Ok(StageOutcome::Completed {
            lines: count_lines(stage.outputs.first()),
            summary: None,
        })
    }

    fn run_merge(&self, stage: &Stage) -> StageResult<()> {
        let mut sets = Vec::with_capacity(stage.inputs.len());
        for input in &stage.inputs {
            sets.push(read_lines(input).map_err(|e| missing_as_input(stage, e))?);
        }

        let merged = merge_lines(sets);
        debug!(stage = %stage.name, lines = merged.len(), "merged inputs");
        for output in &stage.outputs {
            write_lines_atomic(output, &merged)?;
        }
        Ok(())
    }

    async fn run_probe(
        &self,
        stage: &Stage,
        cancel: &CancellationToken,
    ) -> StageResult<StageOutcome> {
        let job = LivenessJob::new(
            stage.name.clone(),
            stage.inputs.clone(),
            stage.outputs.first().cloned(),
        )
        .with_scratch_dir(stage.scratch_dir.clone())
        .with_options(self.liveness.clone());

        match run_liveness(&job, Arc::clone(&self.fetcher), &self.cache, cancel.clone()).await? {
            LivenessOutcome::Skipped => Ok(StageOutcome::Skipped),
            LivenessOutcome::Completed(run) => Ok(StageOutcome::Completed {
                lines: run.merged.alive.len(),
                summary: Some(run.summary),
            }),
        }
    }
}

fn missing_as_input(stage: &Stage, e: StorageError) -> StageError {
    match e {
        StorageError::NotFound(path) => StageError::MissingInput {
            stage: stage.name.clone(),
            path,
        },
        other => StageError::Storage(other),
    }
}

fn count_lines(path: Option<&PathBuf>) -> usize {
    path.and_then(|p| read_lines(p).ok()).map_or(0, |l| l.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::testing::{fast_config, page, ScriptedFetcher};
    use std::fs;
    use tempfile::TempDir;

    fn definition(seed_command: &str) -> PipelineDefinition {
        serde_json::from_value(serde_json::json!({
            "stages": [
                {"name": "seed", "kind": "external", "command": seed_command, "outputs": ["seed.txt"]},
                {"name": "extra", "kind": "external", "command": "printf 'http://x/a\\n' > {output}", "outputs": ["extra.txt"]},
                {"name": "candidates", "kind": "merge", "inputs": ["seed.txt", "extra.txt"], "outputs": ["candidates.txt"]},
                {"name": "probe", "kind": "probe", "inputs": ["candidates.txt"], "outputs": ["alive.txt"]}
            ]
        }))
        .unwrap()
    }

    fn fetcher() -> Arc<ScriptedFetcher> {
        Arc::new(
            ScriptedFetcher::new()
                .script("http://x/a", vec![page(200, "A"), page(200, "A")])
                .script("http://x/b", vec![page(404, "B"), page(404, "B")]),
        )
    }

    fn runner(
        dir: &Path,
        definition: PipelineDefinition,
        fetcher: Arc<ScriptedFetcher>,
        force: ForcePolicy,
    ) -> PipelineRunner<ScriptedFetcher> {
        let options = LivenessOptions {
            probe: fast_config().with_retries(1),
            chunks: 2,
            ..LivenessOptions::default()
        };
        PipelineRunner::new("example.com".parse().unwrap(), dir, definition, fetcher)
            .unwrap()
            .with_cache(StageCache::new(force))
            .unwrap()
            .with_liveness_options(options)
    }

    #[tokio::test]
    async fn test_pipeline_runs_then_skips() {
        let dir = TempDir::new().unwrap();
        let seed = "printf 'http://x/b\\nhttp://x/a\\n' > {output}";
        let fetcher = fetcher();

        let first = runner(dir.path(), definition(seed), Arc::clone(&fetcher), ForcePolicy::None)
            .run(CancellationToken::new())
            .await;
        assert!(first.is_success(), "{:?}", first.error);
        let root = dir.path().join("example.com");
        assert_eq!(
            fs::read_to_string(root.join("candidates.txt")).unwrap(),
            "http://x/a\nhttp://x/b\n"
        );
        assert_eq!(fs::read_to_string(root.join("alive.txt")).unwrap(), "http://x/a\n");
        assert!(root.join("raw/seed/stdout.log").exists());
        assert_eq!(fetcher.calls().len(), 2);

        let second = runner(dir.path(), definition(seed), Arc::clone(&fetcher), ForcePolicy::None)
            .run(CancellationToken::new())
            .await;
        assert!(second.is_success());
        assert!(second
            .stages
            .iter()
            .all(|s| matches!(s.outcome, StageOutcome::Skipped)));
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_stage_stops_pipeline() {
        let dir = TempDir::new().unwrap();
        let seed = "printf 'partial\\n' > {output}; exit 7";

        let report = runner(dir.path(), definition(seed), fetcher(), ForcePolicy::None)
            .run(CancellationToken::new())
            .await;

        assert_eq!(report.stages.len(), 1);
        assert!(matches!(report.stages[0].outcome, StageOutcome::Failed(_)));
        assert!(matches!(report.error, Some(StageError::CommandFailed { .. })));
        assert!(!dir.path().join("example.com/seed.txt").exists());
    }

    #[tokio::test]
    async fn test_force_stage_reruns_only_that_stage() {
        let dir = TempDir::new().unwrap();
        let seed = "printf 'http://x/b\\nhttp://x/a\\n' > {output}";
        let fetcher = fetcher();
        runner(dir.path(), definition(seed), Arc::clone(&fetcher), ForcePolicy::None)
            .run(CancellationToken::new())
            .await;

        let forced = ForcePolicy::from_flags(false, ["probe"]);
        let report = runner(dir.path(), definition(seed), Arc::clone(&fetcher), forced)
            .run(CancellationToken::new())
            .await;

        let outcomes: Vec<bool> = report
            .stages
            .iter()
            .map(|s| matches!(s.outcome, StageOutcome::Skipped))
            .collect();
        assert_eq!(outcomes, vec![true, true, true, false]);
        assert_eq!(fetcher.calls().len(), 4);
    }

    #[test]
    fn test_unknown_forced_stage_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = PipelineRunner::new(
            "example.com".parse().unwrap(),
            dir.path(),
            definition("true"),
            fetcher(),
        )
        .unwrap()
        .with_cache(StageCache::new(ForcePolicy::from_flags(false, ["nope"])));

        assert!(matches!(result, Err(PipelineError::UnknownStage(name)) if name == "nope"));
    }

    #[test]
    fn test_plan_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let layout = TargetLayout::new("example.com".parse().unwrap(), dir.path());
        let plan = layout.plan(&definition("true"), &StageCache::new(ForcePolicy::All));

        assert_eq!(plan.len(), 4);
        assert!(plan.iter().all(|(_, d)| *d == StageDecision::Run));
        assert_eq!(plan[3].0.outputs, vec![dir.path().join("example.com/alive.txt")]);
        assert!(!dir.path().join("example.com").exists());
    }
}
