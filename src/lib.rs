//! autonmt: data preparation pipeline for machine translation experiments.
//!
//! One YAML file describes an experiment. The pipeline loads and caps raw
//! parallel corpora, runs per-corpus preprocessing scripts, tokenizes the
//! result, builds vocabularies and splits the data into named sets, calling
//! external tools for the heavy lifting.

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod stages;

pub use config::{ConfigError, ConfigFactory, RawConfig};
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineOptions, PipelineReport};
pub use runner::{CommandRunner, CommandSpec, RunnerError, SubprocessRunner};
pub use stages::{Stage, StageError, StageKind};
