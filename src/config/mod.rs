//! Pipeline configuration.
//!
//! One YAML document drives every stage. It is loaded once into a
//! [`RawConfig`] and each stage asks the [`ConfigFactory`] for its own typed
//! view:
//!
//! - `load` → [`LoadConfig`]
//! - `tokenize` → [`TokenizeConfig`]
//! - `build_vocab` → [`BuildVocabConfig`]
//! - `split` → [`SplitConfig`]
//! - `train` → [`TrainConfig`]
//!
//! # Example
//!
//! ```rust,ignore
//! use autonmt::config::{ConfigFactory, RawConfig};
//!
//! let factory = ConfigFactory::new(RawConfig::from_file("experiment.yml")?);
//! match factory.tokenize() {
//!     Ok(config) => println!("tokenizing into {}", config.output_data_dir.display()),
//!     Err(e) if e.is_missing() => println!("tokenize not configured: {e}"),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

pub mod factory;
pub mod raw;
pub mod types;
pub mod views;

use thiserror::Error;

pub use factory::{ConfigFactory, StageConfig, SUPPORTED_STAGES};
pub use raw::{Lookup, RawConfig};
pub use types::{CorpusInfo, ExperimentDirs, LanguagePair, MissingDataPolicy};
pub use views::{
    BuildVocabConfig, LoadConfig, ModelSource, PreprocessingStep, SplitConfig, SplitPart,
    SplitPlan, TokenizeConfig, TrainConfig, VocabSpec,
};

/// Errors that can occur while loading the document or building a view.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A key required by the stage is absent.
    #[error("Missing config element '{key}' for stage '{stage}'")]
    Missing { stage: String, key: String },

    /// A key is present but has the wrong shape.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The factory was asked for a stage it does not know.
    #[error("Factory cannot build config for stage '{0}'")]
    UnsupportedStage(String),

    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// True for the recoverable "stage not configured" case.
    pub fn is_missing(&self) -> bool {
        matches!(self, ConfigError::Missing { .. })
    }
}
