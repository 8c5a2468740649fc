//! Human-readable console output.
//!
//! Messages go to stderr. Stdout carries only data: the run artifact when no
//! output file is given, and the `stages` listing.

use crate::config::StageKind;
use crate::pipeline::{PipelineReport, StageOutcome, StageReport};
use crate::stage::StageDecision;
use crate::storage::RunSummary;
use console::{style, Style};
use std::path::Path;

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Print a header before probing begins.
pub fn print_probe_header(inputs: &[&Path], chunks: usize, retries: u32, timeout_secs: f64) {
    eprintln!();
    eprintln!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("urlsift").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    for input in inputs {
        eprintln!("{} Input: {}", style("•").dim(), style(input.display()).white().bold());
    }
    eprintln!(
        "{} Workers: {}, attempts per URL: {}, timeout: {}s",
        style("•").dim(),
        style(chunks.max(1)).yellow(),
        style(retries.max(1)).yellow(),
        timeout_secs
    );
    eprintln!();
}

/// Print the summary of a liveness run.
pub fn print_run_summary(summary: &RunSummary) {
    eprintln!();
    eprintln!("{}", style(RULE).cyan());
    eprintln!("                    {} Liveness Results", style("urlsift").cyan().bold());
    eprintln!("{}", style(RULE).cyan());
    eprintln!();

    eprintln!("  {} {}", style("Run ID:").bold(), style(summary.id.short()).dim());
    if let Some(ref output) = summary.output {
        eprintln!("  {} {}", style("Output:").bold(), output.display());
    }
    eprintln!();

    eprintln!(
        "  {} {} candidates in {:.2}s",
        style("Statistics:").bold(),
        summary.candidates,
        summary.duration_ms as f64 / 1000.0
    );
    eprintln!(
        "               {} alive, {} soft 404, {} real 404, {} unknown, {} skipped",
        style(summary.alive).green().bold(),
        style(summary.soft_not_found).yellow(),
        style(summary.real_not_found).red(),
        style(summary.unknown).magenta(),
        style(summary.skipped).dim()
    );
    eprintln!();

    if summary.workers.len() > 1 {
        eprintln!("  {}", style(THIN_RULE).dim());
        eprintln!(
            "  {:>6}  {:>6}  {:>8}  {:>8}  {}",
            style("WORKER").bold(),
            style("URLS").bold(),
            style("HANDLED").bold(),
            style("SKIPPED").bold(),
            style("STATUS").bold()
        );
        eprintln!("  {}", style(THIN_RULE).dim());
        for worker in &summary.workers {
            let status_style = if worker.status == "completed" {
                Style::new().green()
            } else {
                Style::new().red().bold()
            };
            eprintln!(
                "  {:>6}  {:>6}  {:>8}  {:>8}  {}",
                worker.ordinal,
                worker.size,
                worker.handled,
                worker.skipped,
                status_style.apply_to(&worker.status)
            );
        }
        eprintln!("  {}", style(THIN_RULE).dim());
        eprintln!();
    }
}

/// Announce a pipeline stage.
pub fn print_stage_start(position: usize, total: usize, name: &str, kind: StageKind) {
    eprintln!(
        "{} [{}/{}] {} {}",
        style("→").cyan().bold(),
        position,
        total,
        style(name).white().bold(),
        style(format!("({})", kind)).dim()
    );
}

/// Print how a pipeline stage ended.
pub fn print_stage_result(report: &StageReport) {
    let elapsed = format!("[{:.2}s]", report.elapsed.as_secs_f64());
    match &report.outcome {
        StageOutcome::Skipped => eprintln!(
            "  {} {} outputs present, skipped",
            style("↷").yellow(),
            report.name
        ),
        StageOutcome::Completed { lines, summary } => {
            eprintln!(
                "  {} {} produced {} lines {}",
                style("✓").green().bold(),
                report.name,
                lines,
                style(elapsed).dim()
            );
            if let Some(summary) = summary {
                eprintln!("    {}", style(summary.summary()).dim());
            }
        }
        StageOutcome::Failed(reason) => eprintln!(
            "  {} {} {}",
            style("✗").red().bold(),
            style(reason).red(),
            style(elapsed).dim()
        ),
    }
}

/// Print the closing line of a pipeline run.
pub fn print_pipeline_report(report: &PipelineReport) {
    eprintln!();
    let ran = report
        .stages
        .iter()
        .filter(|s| matches!(s.outcome, StageOutcome::Completed { .. }))
        .count();
    let skipped = report
        .stages
        .iter()
        .filter(|s| matches!(s.outcome, StageOutcome::Skipped))
        .count();

    if report.is_success() {
        print_success(&format!(
            "{}: {} stages run, {} skipped ({})",
            report.target,
            ran,
            skipped,
            report.root.display()
        ));
    } else {
        print_error(&format!(
            "{}: pipeline stopped after {} stages",
            report.target,
            report.stages.len()
        ));
    }
}

/// Print one row of the `stages` listing to stdout.
pub fn print_stage_state(name: &str, kind: StageKind, decision: StageDecision, outputs: &[&Path]) {
    let state = match decision {
        StageDecision::Skip => style("done   ").green(),
        StageDecision::Run => style("pending").yellow(),
    };
    let outputs = outputs
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "  {}  {:<14} {:<9} {}",
        state,
        name,
        kind.to_string(),
        style(truncate_string(&outputs, 60)).dim()
    );
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum number of characters, adding an ellipsis
/// if truncated.
fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
