//! Command-line interface for autonmt.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
