//! Artifact and record persistence.
//!
//! Line artifacts consumed by the stage cache, the UNKNOWN diagnostics log,
//! raw HTML capture and run summaries.

pub mod artifact;
mod diagnostics;
mod html_dump;
mod summary;

pub use artifact::{
    is_nonempty_file, read_lines, remove_dir_if_exists, remove_file_if_exists, write_atomic,
    write_lines_atomic,
};
pub use diagnostics::{default_diagnostics_path, render_diagnostics, write_diagnostics_log};
pub use html_dump::HtmlDump;
pub use summary::{RunSummary, WorkerSummary};
