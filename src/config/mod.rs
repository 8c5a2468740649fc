//! Configuration management for urlsift.
//!
//! Provides XDG-compliant application settings and the pipeline
//! definitions run by `urlsift run`.

mod pipeline;
mod settings;

pub use pipeline::{PipelineDefinition, StageKind, StageSpec};
pub use settings::{AppSettings, Paths};
