//! External command execution.
//!
//! Every stage reaches the outside world through a [`CommandRunner`]:
//!
//! ```text
//! Stage → CommandSpec → CommandRunner::run → ProcessOutput | RunnerError
//! ```
//!
//! The production [`SubprocessRunner`] blocks the calling stage until the
//! child exits. There is no timeout and no retry; a nonzero exit becomes
//! [`RunnerError::Failed`] carrying the captured stdout/stderr.

pub mod config;
pub mod executor;
pub mod result;

pub use config::{CommandSpec, Redirect};
pub use executor::{CommandRunner, RunnerError, SubprocessRunner};
pub use result::{ProcessOutput, SubprocessExecutionError};
