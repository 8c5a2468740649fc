//! Stage cache controller.
//!
//! A stage is done when every declared output exists and is non-empty.
//! Nothing else is consulted: no hashes, no timestamps. Stale outputs are
//! reused until the operator forces the stage.

use crate::error::StorageResult;
use crate::storage::{is_nonempty_file, remove_dir_if_exists, remove_file_if_exists};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A pipeline step with declared inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    /// Raw or intermediate files owned by the stage.
    pub scratch_dir: Option<PathBuf>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            scratch_dir: None,
        }
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn with_inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn with_outputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.outputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    /// Whether every output exists and is non-empty.
    ///
    /// A stage without outputs is never complete.
    pub fn is_complete(&self) -> bool {
        !self.outputs.is_empty() && self.outputs.iter().all(|p| is_nonempty_file(p))
    }

    /// Inputs that do not exist.
    pub fn missing_inputs(&self) -> Vec<&Path> {
        self.inputs
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| !p.exists())
            .collect()
    }

    /// Remove the scratch directory and every output.
    pub fn invalidate(&self) -> StorageResult<()> {
        if let Some(ref dir) = self.scratch_dir {
            remove_dir_if_exists(dir)?;
        }
        for output in &self.outputs {
            remove_file_if_exists(output)?;
        }
        Ok(())
    }
}

/// Which stages the operator forced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForcePolicy {
    #[default]
    None,
    All,
    Only(HashSet<String>),
}

impl ForcePolicy {
    /// Build from a global `--force` flag and `--force-stage` names.
    pub fn from_flags<I, S>(force_all: bool, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if force_all {
            return Self::All;
        }
        let names: HashSet<String> = stages.into_iter().map(Into::into).collect();
        if names.is_empty() {
            Self::None
        } else {
            Self::Only(names)
        }
    }

    pub fn forces(&self, stage: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Only(names) => names.contains(stage),
        }
    }
}

/// What to do with a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDecision {
    /// Outputs are present; leave them alone.
    Skip,
    Run,
}

/// Decides whether stages run, invalidating forced ones.
#[derive(Debug, Clone, Default)]
pub struct StageCache {
    force: ForcePolicy,
}

impl StageCache {
    pub fn new(force: ForcePolicy) -> Self {
        Self { force }
    }

    pub fn force_policy(&self) -> &ForcePolicy {
        &self.force
    }

    /// Decide for `stage`. A forced stage is invalidated before `Run` is
    /// returned.
    pub fn decide(&self, stage: &Stage) -> StorageResult<StageDecision> {
        if self.force.forces(&stage.name) {
            debug!(stage = %stage.name, "forced, invalidating outputs");
            stage.invalidate()?;
            return Ok(StageDecision::Run);
        }

        if stage.is_complete() {
            debug!(stage = %stage.name, "outputs present, skipping");
            return Ok(StageDecision::Skip);
        }

        Ok(StageDecision::Run)
    }

    /// Report-only view: the decision `decide` would make, without side effects.
    pub fn peek(&self, stage: &Stage) -> StageDecision {
        if !self.force.forces(&stage.name) && stage.is_complete() {
            StageDecision::Skip
        } else {
            StageDecision::Run
        }
    }
}
