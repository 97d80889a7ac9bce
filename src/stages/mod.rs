//! Pipeline stages.
//!
//! Each stage owns its typed configuration and performs one unit of work,
//! reaching external tools only through a [`CommandRunner`]. Stages run to
//! completion one after another; none of them spawns concurrent work.

pub mod load;
pub mod split;
pub mod tokenize;
pub mod vocab;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::runner::{CommandRunner, RunnerError};

pub use load::LoadAndPreprocess;
pub use split::Split;
pub use tokenize::Tokenize;
pub use vocab::BuildVocab;

/// The runnable stages, in canonical pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    #[value(name = "load")]
    Load,
    #[value(name = "tokenize")]
    Tokenize,
    #[value(name = "build_vocab")]
    BuildVocab,
    #[value(name = "split")]
    Split,
}

impl StageKind {
    /// Full pipeline order.
    pub const ALL: [StageKind; 4] = [
        StageKind::Load,
        StageKind::Tokenize,
        StageKind::BuildVocab,
        StageKind::Split,
    ];

    /// Identifier used in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Load => "load",
            StageKind::Tokenize => "tokenize",
            StageKind::BuildVocab => "build_vocab",
            StageKind::Split => "split",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

/// One unit of pipeline work.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Runs the stage to completion.
    async fn run(&self, runner: &dyn CommandRunner) -> Result<(), StageError>;
}

/// Errors raised while a stage runs. All of them end the pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    /// Raw corpus files are absent and the data policy says to abort.
    #[error("No data found for corpus '{corpus}' ({pair}), looked for: {}", tried.join(", "))]
    MissingData {
        corpus: String,
        pair: String,
        tried: Vec<String>,
    },

    /// A preprocessing script failed.
    #[error("Error during '{step}' preprocessing step for '{corpus}' corpus: {source}")]
    Preprocessing {
        step: String,
        corpus: String,
        #[source]
        source: RunnerError,
    },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Stage outputs do not line up with what the configuration declares.
    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("IO error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StageError {
    /// Wraps an IO error with the path it happened on.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> StageError {
        let path = path.as_ref().to_path_buf();
        move |source| StageError::Io { path, source }
    }
}

/// Logs captured stderr of a failed command line by line.
pub(crate) fn log_stderr(err: &RunnerError) {
    if let Some(stderr) = err.stderr() {
        for line in stderr.lines() {
            tracing::error!("{}", line);
        }
    }
}
