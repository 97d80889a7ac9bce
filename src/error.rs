//! Top-level error type for a pipeline run.
//!
//! Subsystems keep their own error enums:
//! - [`ConfigError`]: loading the document and building stage views
//! - [`RunnerError`](crate::runner::RunnerError): external commands
//! - [`StageError`]: failures inside a running stage
//!
//! [`PipelineError`] ties them together with the stage they belong to. Every
//! variant is fatal; the binary logs it and exits non-zero.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::runner::{RunnerError, SubprocessExecutionError};
pub use crate::stages::StageError;

use crate::stages::StageKind;

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration document could not be loaded, or a view was
    /// malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage is not configured and the policy is to abort.
    #[error("Stage '{stage}' is not configured: {source}")]
    MissingConfig {
        stage: StageKind,
        #[source]
        source: ConfigError,
    },

    /// A stage started and failed.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: StageKind,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    /// The stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            PipelineError::Config(_) => None,
            PipelineError::MissingConfig { stage, .. } | PipelineError::Stage { stage, .. } => {
                Some(*stage)
            }
        }
    }
}
