//! Pipeline definitions.
//!
//! A pipeline is an ordered list of stages. Paths in a definition are
//! relative to the target's directory; the runner resolves them.

use crate::error::{ConfigError, PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path};

/// How a stage produces its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// A shell command run through `sh -c`.
    External,
    /// Set union of the input line files.
    Merge,
    /// Liveness probing of the input URLs.
    Probe,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::External => write!(f, "external"),
            Self::Merge => write!(f, "merge"),
            Self::Probe => write!(f, "probe"),
        }
    }
}

/// One stage of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub kind: StageKind,
    /// Command template for external stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl StageSpec {
    fn external(name: &str, command: &str, inputs: &[&str], output: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: StageKind::External,
            command: Some(command.to_string()),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: vec![output.to_string()],
        }
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub stages: Vec<StageSpec>,
}

impl Default for PipelineDefinition {
    /// subfinder, then dnsx, naabu and katana, merged into one candidate list
    /// that is probed for liveness.
    fn default() -> Self {
        Self {
            stages: vec![
                StageSpec::external(
                    "subfinder",
                    "subfinder -silent -d {target} -o {output}",
                    &[],
                    "subdomains.txt",
                ),
                StageSpec::external(
                    "dnsx",
                    "dnsx -silent -l {input} -o {output}",
                    &["subdomains.txt"],
                    "resolved.txt",
                ),
                StageSpec::external(
                    "naabu",
                    "naabu -silent -list {input} -o {output}",
                    &["resolved.txt"],
                    "ports.txt",
                ),
                StageSpec::external(
                    "katana",
                    "katana -silent -list {input} -o {output}",
                    &["resolved.txt"],
                    "endpoints.txt",
                ),
                StageSpec {
                    name: "candidates".to_string(),
                    kind: StageKind::Merge,
                    command: None,
                    inputs: vec![
                        "resolved.txt".to_string(),
                        "ports.txt".to_string(),
                        "endpoints.txt".to_string(),
                    ],
                    outputs: vec!["candidates.txt".to_string()],
                },
                StageSpec {
                    name: "probe".to_string(),
                    kind: StageKind::Probe,
                    command: None,
                    inputs: vec!["candidates.txt".to_string()],
                    outputs: vec!["alive.txt".to_string()],
                },
            ],
        }
    }
}

impl PipelineDefinition {
    /// Load and validate a definition from a JSON file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let definition: Self = serde_json::from_str(&content).map_err(ConfigError::from)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Check names, paths and per-kind requirements.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.stages.is_empty() {
            return Err(invalid("pipeline has no stages"));
        }

        let mut names = HashSet::new();
        for stage in &self.stages {
            let name = stage.name.trim();
            if name.is_empty() {
                return Err(invalid("stage with empty name"));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(invalid(format!("stage name '{}' is not a plain name", name)));
            }
            if !names.insert(name) {
                return Err(invalid(format!("duplicate stage name '{}'", name)));
            }

            if stage.outputs.is_empty() {
                return Err(invalid(format!("stage '{}' declares no output", name)));
            }
            for path in stage.inputs.iter().chain(&stage.outputs) {
                if !is_relative_within(path) {
                    return Err(invalid(format!(
                        "stage '{}': path '{}' must be relative to the target directory",
                        name, path
                    )));
                }
            }

            match (stage.kind, stage.command.as_deref()) {
                (StageKind::External, None) => {
                    return Err(invalid(format!("external stage '{}' needs a command", name)));
                }
                (StageKind::External, Some(cmd)) if cmd.trim().is_empty() => {
                    return Err(invalid(format!("external stage '{}' has an empty command", name)));
                }
                (StageKind::Merge | StageKind::Probe, Some(_)) => {
                    return Err(invalid(format!(
                        "{} stage '{}' does not take a command",
                        stage.kind, name
                    )));
                }
                (StageKind::Merge | StageKind::Probe, None) if stage.inputs.is_empty() => {
                    return Err(invalid(format!("{} stage '{}' needs inputs", stage.kind, name)));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::InvalidDefinition(msg.into())
}

fn is_relative_within(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_definition_is_valid() {
        let definition = PipelineDefinition::default();
        definition.validate().unwrap();
        assert_eq!(definition.stages.len(), 6);
        assert_eq!(definition.stage("probe").unwrap().kind, StageKind::Probe);
    }

    #[test]
    fn test_load_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(
            &path,
            r#"{"stages": [
                {"name": "seed", "kind": "external", "command": "echo {target} > {output}", "outputs": ["seed.txt"]},
                {"name": "probe", "kind": "probe", "inputs": ["seed.txt"], "outputs": ["alive.txt"]}
            ]}"#,
        )
        .unwrap();

        let definition = PipelineDefinition::load(&path).unwrap();
        assert_eq!(definition.stages[0].kind, StageKind::External);
        assert!(definition.stages[0].inputs.is_empty());
    }

    fn single(stage: StageSpec) -> PipelineResult<()> {
        PipelineDefinition {
            stages: vec![stage],
        }
        .validate()
    }

    fn probe_stage() -> StageSpec {
        StageSpec {
            name: "probe".to_string(),
            kind: StageKind::Probe,
            command: None,
            inputs: vec!["in.txt".to_string()],
            outputs: vec!["alive.txt".to_string()],
        }
    }

    #[test]
    fn test_validation_rules() {
        assert!(single(probe_stage()).is_ok());

        let mut no_output = probe_stage();
        no_output.outputs.clear();
        assert!(single(no_output).is_err());

        let mut with_command = probe_stage();
        with_command.command = Some("true".to_string());
        assert!(single(with_command).is_err());

        let mut external = probe_stage();
        external.kind = StageKind::External;
        assert!(single(external).is_err());

        let mut escaping = probe_stage();
        escaping.outputs = vec!["../alive.txt".to_string()];
        assert!(single(escaping).is_err());

        let mut absolute = probe_stage();
        absolute.inputs = vec!["/etc/hosts".to_string()];
        assert!(single(absolute).is_err());

        let duplicate = PipelineDefinition {
            stages: vec![probe_stage(), probe_stage()],
        };
        assert!(matches!(
            duplicate.validate(),
            Err(PipelineError::InvalidDefinition(_))
        ));

        assert!(PipelineDefinition { stages: vec![] }.validate().is_err());
    }
}
