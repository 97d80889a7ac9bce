//! Outcome of an external command.

use std::time::Duration;

use thiserror::Error;

/// What a finished process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout; empty unless stdout was [`super::Redirect::Capture`].
    pub stdout: Vec<u8>,
    /// Captured stderr; empty unless stderr was [`super::Redirect::Capture`].
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stdout split into lines after trimming the whole output. Blank lines
    /// are dropped; other lines keep their inner whitespace.
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout_text()
            .trim()
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect()
    }
}

/// A command exited unsuccessfully. Carries everything that was captured so
/// the caller can log it.
#[derive(Debug, Clone, Error)]
#[error("Subprocess '{command}' returned {}", describe_exit(.exit_code))]
pub struct SubprocessExecutionError {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SubprocessExecutionError {
    pub fn new(command: impl Into<String>, output: &ProcessOutput) -> Self {
        Self {
            command: command.into(),
            exit_code: output.exit_code,
            stdout: output.stdout_text(),
            stderr: output.stderr_text(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
