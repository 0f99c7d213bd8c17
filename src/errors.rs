use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants::tokens;

/// Error type for descriptor validation, stage computation, and rendering failures.
///
/// Every variant maps to a stable token (see [`PipelineError::token`]) so the
/// calling layer can translate failures into its own user-facing messages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed descriptor literal or configuration value.
    #[error("configuration error: {0}")]
    Config(String),
    /// Aggregate stage parameters or computation.
    #[error("aggregation failed: {0}")]
    Aggregate(String),
    /// Order stage parameters or computation.
    #[error("ordering failed: {0}")]
    Order(String),
    /// Limit stage parameters or computation.
    #[error("limit failed: {0}")]
    Limit(String),
    /// Final display step.
    #[error("rendering failed: {0}")]
    Render(String),
    /// A stage input vanished between steps.
    #[error("working file '{}' disappeared before it could be read", path.display())]
    WorkingFileMissing {
        /// Path that was expected on disk.
        path: PathBuf,
    },
    /// Filesystem failure outside a stage computation.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Caller-recognizable token for this failure category.
    pub fn token(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => tokens::CONFIG_ERROR,
            PipelineError::Aggregate(_) => tokens::AGGREGATE_ERROR,
            PipelineError::Order(_) => tokens::ORDER_ERROR,
            PipelineError::Limit(_) => tokens::LIMIT_ERROR,
            PipelineError::Render(_) => tokens::RENDER_ERROR,
            PipelineError::WorkingFileMissing { .. } => tokens::WORKING_FILE_MISSING,
            PipelineError::Io(_) => tokens::IO_ERROR,
        }
    }
}
