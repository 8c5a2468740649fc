//! Output formatting module.
//!
//! Console messages and summaries, plus JSON and CSV per-URL reports.

mod plain;
mod report;

pub use plain::{
    print_error, print_info, print_pipeline_report, print_probe_header, print_run_summary,
    print_stage_result, print_stage_start, print_stage_state, print_success, print_warning,
};
pub use report::{render_report, report_rows, write_report, ReportFormat, ReportRow};
