//! External collaborator stages.
//!
//! Commands are templates run through `sh -c` from the target directory.
//! Placeholders are replaced with shell-quoted values. A command that fails
//! or is interrupted has its outputs removed, so the stage cache never
//! mistakes a partial file for a finished stage.

use crate::error::{StageError, StageResult};
use crate::stage::Stage;
use crate::storage::remove_file_if_exists;
use crate::types::Target;
use std::fs;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Values substituted into a command template.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub target: &'a Target,
    pub stage: &'a Stage,
}

impl Placeholders<'_> {
    /// Expand `{target}`, `{input}`, `{inputs}`, `{output}` and `{raw_dir}`.
    ///
    /// `{input}` and `{output}` are the first declared path; unknown braces
    /// are left alone.
    pub fn render(&self, template: &str) -> String {
        let first_input = self.stage.inputs.first().map(|p| quote_path(p)).unwrap_or_default();
        let all_inputs = self
            .stage
            .inputs
            .iter()
            .map(|p| quote_path(p))
            .collect::<Vec<_>>()
            .join(" ");
        let first_output = self.stage.outputs.first().map(|p| quote_path(p)).unwrap_or_default();
        let raw_dir = self
            .stage
            .scratch_dir
            .as_deref()
            .map(quote_path)
            .unwrap_or_default();

        template
            .replace("{target}", &shell_quote(self.target.as_str()))
            .replace("{inputs}", &all_inputs)
            .replace("{input}", &first_input)
            .replace("{output}", &first_output)
            .replace("{raw_dir}", &raw_dir)
    }
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Run `command` for `stage` from `cwd`.
///
/// Stdout and stderr of the command go to `stdout.log` and `stderr.log` in
/// the stage's scratch directory.
pub async fn run_command(
    stage: &Stage,
    command: &str,
    cwd: &Path,
    cancel: &CancellationToken,
) -> StageResult<()> {
    let spawn_err = |source| StageError::Spawn {
        stage: stage.name.clone(),
        source,
    };

    for output in &stage.outputs {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(spawn_err)?;
        }
    }

    let (stdout, stderr) = match stage.scratch_dir {
        Some(ref dir) => {
            fs::create_dir_all(dir).map_err(spawn_err)?;
            (
                Stdio::from(fs::File::create(dir.join("stdout.log")).map_err(spawn_err)?),
                Stdio::from(fs::File::create(dir.join("stderr.log")).map_err(spawn_err)?),
            )
        }
        None => (Stdio::null(), Stdio::null()),
    };

    debug!(stage = %stage.name, %command, "spawning");
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(spawn_err)?;

    let status = tokio::select! {
        status = child.wait() => status.map_err(spawn_err)?,
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!(stage = %stage.name, error = %e, "failed to kill command");
            }
            discard_outputs(stage)?;
            return Err(StageError::Interrupted);
        }
    };

    if !status.success() {
        discard_outputs(stage)?;
        let code = status
            .code()
            .map_or_else(|| "a signal".to_string(), |c| format!("status {}", c));
        return Err(StageError::CommandFailed {
            stage: stage.name.clone(),
            command: command.to_string(),
            code,
        });
    }

    Ok(())
}

fn discard_outputs(stage: &Stage) -> StageResult<()> {
    for output in &stage.outputs {
        remove_file_if_exists(output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stage(dir: &Path) -> Stage {
        Stage::new("seed")
            .with_input(dir.join("in.txt"))
            .with_input(dir.join("in two.txt"))
            .with_output(dir.join("out.txt"))
            .with_scratch_dir(Some(dir.join("raw/seed")))
    }

    #[test]
    fn test_render_placeholders() {
        let target: Target = "example.com".parse().unwrap();
        let stage = Stage::new("s")
            .with_inputs(["a.txt", "b c.txt"])
            .with_output("out.txt")
            .with_scratch_dir(Some("raw/s".into()));
        let rendered = Placeholders {
            target: &target,
            stage: &stage,
        }
        .render("tool -d {target} -l {input} -all {inputs} -o {output} -w {raw_dir} {other}");

        assert_eq!(
            rendered,
            "tool -d 'example.com' -l 'a.txt' -all 'a.txt' 'b c.txt' -o 'out.txt' -w 'raw/s' {other}"
        );
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[tokio::test]
    async fn test_successful_command_writes_output() {
        let dir = TempDir::new().unwrap();
        let stage = stage(dir.path());
        let target: Target = "example.com".parse().unwrap();
        let command = Placeholders {
            target: &target,
            stage: &stage,
        }
        .render("printf '%s\\n' {target} > {output}");

        run_command(&stage, &command, dir.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "example.com\n");
        assert!(dir.path().join("raw/seed/stderr.log").exists());
    }

    #[tokio::test]
    async fn test_failed_command_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let stage = stage(dir.path());
        let command = format!("echo partial > {}; exit 3", quote_path(&dir.path().join("out.txt")));

        let err = run_command(&stage, &command, dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            StageError::CommandFailed { code, .. } => assert_eq!(code, "status 3"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!dir.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn test_interrupt_kills_command() {
        let dir = TempDir::new().unwrap();
        let stage = stage(dir.path());
        let command = format!("echo partial > {}; sleep 30", quote_path(&dir.path().join("out.txt")));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = run_command(&stage, &command, dir.path(), &cancel).await.unwrap_err();
        assert!(matches!(err, StageError::Interrupted));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert!(!dir.path().join("out.txt").exists());
    }
}
