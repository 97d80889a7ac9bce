//! Description of one external command invocation.

use std::fmt;
use std::path::PathBuf;

/// Where a standard stream of the child process goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Share the parent's stream.
    Inherit,
    /// Collect into [`super::ProcessOutput`].
    Capture,
    /// Discard (or, for stdin, provide an empty stream).
    Null,
    /// Feed stdin from a file.
    ReadFrom(PathBuf),
    /// Write the stream into a file, truncating it first.
    WriteTo(PathBuf),
    /// Send stderr to the same destination as stdout. Only valid for stderr
    /// when stdout is [`Redirect::WriteTo`].
    MergeWithStdout,
}

/// A program, its arguments and its stdio wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments, passed verbatim (no shell).
    pub args: Vec<String>,
    pub stdin: Redirect,
    pub stdout: Redirect,
    pub stderr: Redirect,
}

impl CommandSpec {
    /// Creates a command with an empty stdin and inherited stdout/stderr.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: Redirect::Null,
            stdout: Redirect::Inherit,
            stderr: Redirect::Inherit,
        }
    }

    /// Builds a command from a configured command line such as
    /// `["python3", "split.py"]`: the first element is the program, the rest
    /// become leading arguments.
    pub fn from_command_line(command: &[String]) -> Self {
        let mut parts = command.iter();
        let program = parts.next().cloned().unwrap_or_default();
        Self::new(program).with_args(parts.cloned())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_stdin(mut self, stdin: Redirect) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_stdout(mut self, stdout: Redirect) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn with_stderr(mut self, stderr: Redirect) -> Self {
        self.stderr = stderr;
        self
    }

    /// Captures both stdout and stderr.
    pub fn captured(self) -> Self {
        self.with_stdout(Redirect::Capture)
            .with_stderr(Redirect::Capture)
    }

    /// Writes stdout and stderr interleaved into one file.
    pub fn with_combined_output(self, path: impl Into<PathBuf>) -> Self {
        self.with_stdout(Redirect::WriteTo(path.into()))
            .with_stderr(Redirect::MergeWithStdout)
    }

    /// Program and arguments joined for logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_defaults() {
        let spec = CommandSpec::new("head");
        assert_eq!(spec.stdin, Redirect::Null);
        assert_eq!(spec.stdout, Redirect::Inherit);
        assert_eq!(spec.stderr, Redirect::Inherit);
        assert!(spec.args.is_empty());
    }

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("onmt-build-vocab")
            .with_args(["--size", "32000"])
            .arg("in.txt")
            .with_combined_output("/out/vocab.log");

        assert_eq!(spec.args, vec!["--size", "32000", "in.txt"]);
        assert_eq!(spec.stdout, Redirect::WriteTo(PathBuf::from("/out/vocab.log")));
        assert_eq!(spec.stderr, Redirect::MergeWithStdout);
        assert_eq!(spec.command_line(), "onmt-build-vocab --size 32000 in.txt");
    }

    #[test]
    fn test_from_command_line() {
        let command = vec!["python3".to_string(), "split.py".to_string()];
        let spec = CommandSpec::from_command_line(&command).arg("-v");
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec!["split.py", "-v"]);
        assert_eq!(spec.to_string(), "python3 split.py -v");
    }
}
