//! autonmt CLI entry point.
//!
//! Initializes logging and delegates to the CLI module.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = autonmt::cli::parse_cli();

    // Priority: RUST_LOG env var > --verbose > default "warn"
    let log_filter = cli.log_level();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter)))
        .init();

    autonmt::cli::run_with_cli(cli).await
}
