//! Runs external commands and turns nonzero exits into errors.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::config::{CommandSpec, Redirect};
use super::result::{ProcessOutput, SubprocessExecutionError};

/// Something that can execute a [`CommandSpec`].
///
/// Stages only talk to this trait, so tests can substitute a recorder for
/// the real process launcher.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion.
    ///
    /// Returns the captured output on exit code 0 and
    /// [`RunnerError::Failed`] otherwise. Never retries.
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, RunnerError>;
}

/// Launches real child processes with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner;

impl SubprocessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, RunnerError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);

        let stdout_file = match &spec.stdout {
            Redirect::WriteTo(path) => Some(create_file(path)?),
            _ => None,
        };

        cmd.stdin(stdin_for(&spec.stdin)?);
        cmd.stdout(match &stdout_file {
            Some(file) => Stdio::from(clone_file(file, &spec.stdout)?),
            None => output_stdio(&spec.stdout)?,
        });
        cmd.stderr(match (&spec.stderr, &stdout_file) {
            (Redirect::MergeWithStdout, Some(file)) => Stdio::from(clone_file(file, &spec.stdout)?),
            (Redirect::MergeWithStdout, None) => {
                return Err(RunnerError::InvalidRedirect(
                    "stderr can only be merged into a stdout file".to_string(),
                ))
            }
            (Redirect::WriteTo(path), _) => Stdio::from(create_file(path)?),
            (other, _) => output_stdio(other)?,
        });

        debug!(command = %spec, "Running subprocess");
        let start = Instant::now();
        // `output()` would reset stdout/stderr to pipes, so spawn with the
        // configured stdio and collect whatever is piped.
        let child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|source| RunnerError::Wait {
                program: spec.program.clone(),
                source,
            })?;

        let result = ProcessOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
            duration: start.elapsed(),
        };
        debug!(
            command = %spec.program,
            exit_code = ?result.exit_code,
            elapsed_ms = result.duration.as_millis() as u64,
            "Subprocess finished"
        );

        if result.success() {
            Ok(result)
        } else {
            Err(SubprocessExecutionError::new(spec.command_line(), &result).into())
        }
    }
}

fn stdin_for(redirect: &Redirect) -> Result<Stdio, RunnerError> {
    match redirect {
        Redirect::Inherit => Ok(Stdio::inherit()),
        Redirect::Null => Ok(Stdio::null()),
        Redirect::Capture => Ok(Stdio::piped()),
        Redirect::ReadFrom(path) => File::open(path)
            .map(Stdio::from)
            .map_err(|source| RunnerError::Redirect {
                path: path.clone(),
                source,
            }),
        other => Err(RunnerError::InvalidRedirect(format!(
            "{:?} is not a valid stdin source",
            other
        ))),
    }
}

fn output_stdio(redirect: &Redirect) -> Result<Stdio, RunnerError> {
    match redirect {
        Redirect::Inherit => Ok(Stdio::inherit()),
        Redirect::Capture => Ok(Stdio::piped()),
        Redirect::Null => Ok(Stdio::null()),
        Redirect::WriteTo(path) => create_file(path).map(Stdio::from),
        other => Err(RunnerError::InvalidRedirect(format!(
            "{:?} is not a valid output destination",
            other
        ))),
    }
}

fn create_file(path: &Path) -> Result<File, RunnerError> {
    File::create(path).map_err(|source| RunnerError::Redirect {
        path: path.to_path_buf(),
        source,
    })
}

fn clone_file(file: &File, redirect: &Redirect) -> Result<File, RunnerError> {
    file.try_clone().map_err(|source| RunnerError::Redirect {
        path: match redirect {
            Redirect::WriteTo(path) => path.clone(),
            _ => PathBuf::new(),
        },
        source,
    })
}

/// Error types for the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open '{}' for redirection: {source}", path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid redirection: {0}")]
    InvalidRedirect(String),

    #[error(transparent)]
    Failed(#[from] SubprocessExecutionError),
}

impl RunnerError {
    /// Captured stderr of a failed process, if there is any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            RunnerError::Failed(err) if !err.stderr.trim().is_empty() => Some(err.stderr.as_str()),
            _ => None,
        }
    }
}
