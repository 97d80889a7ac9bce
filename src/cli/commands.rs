//! Command-line definitions for autonmt.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::pipeline::{MissingConfigPolicy, Pipeline, PipelineOptions};
use crate::stages::StageKind;

/// Runs the data preparation pipeline of a machine translation experiment.
#[derive(Parser, Debug)]
#[command(name = "autonmt")]
#[command(about = "Prepare machine translation training data from a YAML experiment file")]
#[command(version)]
#[command(
    long_about = "autonmt loads raw parallel corpora, preprocesses them, tokenizes the result, builds vocabularies and splits the data into named sets, as described by one YAML configuration file.\n\nExample usage:\n  autonmt experiment.yml -v --skip split"
)]
pub struct Cli {
    /// Path to the YAML experiment configuration.
    pub config: PathBuf,

    /// Log progress at info level instead of warnings only.
    #[arg(short, long)]
    pub verbose: bool,

    /// Stages to run. They always run in pipeline order.
    #[arg(long, value_enum, num_args = 1.., default_values_t = StageKind::ALL)]
    pub steps: Vec<StageKind>,

    /// Stages to leave out.
    #[arg(long, value_enum, num_args = 1..)]
    pub skip: Vec<StageKind>,

    /// What to do when a requested stage is not configured.
    #[arg(long, value_enum, default_value_t = MissingConfigPolicy::Skip)]
    pub on_missing_config: MissingConfigPolicy,

    /// Resolve and print every stage configuration as JSON without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Default log filter for this invocation.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::new()
            .with_steps(self.steps.iter().copied())
            .with_skip(self.skip.iter().copied())
            .with_missing_config_policy(self.on_missing_config)
    }
}

/// Parse CLI arguments and return the Cli struct.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and run.
///
/// For control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the pipeline described by the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_file(&cli.config, cli.pipeline_options())
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;

    if cli.dry_run {
        let plan = pipeline.plan()?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let report = pipeline.run().await?;
    info!(
        executed = report.executed.len(),
        skipped = report.skipped.len(),
        "Pipeline finished"
    );
    Ok(())
}
