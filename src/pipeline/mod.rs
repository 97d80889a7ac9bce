//! Pipeline driver.
//!
//! A run is a fixed, non-branching sequence:
//!
//! 1. **load**: gather, cap and preprocess raw corpora into the final files
//! 2. **tokenize**: learn a BPE model and tokenize the final files
//! 3. **build_vocab**: build vocabularies from tokenized files
//! 4. **split**: cut the data into named partitions (optional)
//!
//! The caller picks a subset with [`PipelineOptions`]; the order is always
//! the one above. For each stage the driver asks the
//! [`ConfigFactory`](crate::config::ConfigFactory) for its configuration.
//! A stage whose configuration is missing is skipped or aborts the run,
//! according to [`MissingConfigPolicy`]. Any stage failure aborts the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use autonmt::pipeline::{Pipeline, PipelineOptions};
//! use autonmt::stages::StageKind;
//!
//! let options = PipelineOptions::new().with_skip([StageKind::Tokenize]);
//! let report = Pipeline::from_file("experiment.yml", options)?.run().await?;
//! println!("ran: {:?}, skipped: {:?}", report.executed, report.skipped);
//! ```

pub mod options;
pub mod orchestrator;

pub use options::{MissingConfigPolicy, PipelineOptions};
pub use orchestrator::{Pipeline, PipelineReport, PlannedStage};
