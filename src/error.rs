//! Error types for urlsift.
//!
//! Uses `thiserror` for ergonomic error definitions. Each layer owns its
//! error enum; `CliError` wraps them all for the binary.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single probe attempt.
///
/// These never reach the operator individually; the prober retries them and
/// only the last one survives as the reason of an UNKNOWN diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("challenge page: {0}")]
    Challenge(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Result type alias for a single fetch.
pub type FetchResult<T> = Result<T, ProbeError>;

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidFormat(e.to_string())
    }
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Artifact and record persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

impl From<csv::Error> for StorageError {
    fn from(e: csv::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunk dispatch errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch interrupted")]
    Interrupted,
}

/// Stage execution errors.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("stage '{stage}': required input {path} is missing")]
    MissingInput { stage: String, path: PathBuf },

    #[error("stage '{stage}': no candidate URLs in input")]
    EmptyInput { stage: String },

    #[error("stage '{stage}': workers failed: {}", format_workers(.workers))]
    WorkersFailed { stage: String, workers: Vec<usize> },

    #[error("stage '{stage}': {command} exited with {code}")]
    CommandFailed {
        stage: String,
        command: String,
        code: String,
    },

    #[error("stage '{stage}': failed to spawn command: {source}")]
    Spawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<DispatchError> for StageError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Interrupted => Self::Interrupted,
        }
    }
}

fn format_workers(workers: &[usize]) -> String {
    workers
        .iter()
        .map(|w| format!("#{w}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Pipeline definition errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level error for CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Whether the command stopped because of a user interrupt.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Stage(StageError::Interrupted))
    }
}

/// Result type alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
