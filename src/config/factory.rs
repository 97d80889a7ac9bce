//! Builds stage configuration views from the raw document.

use serde::Serialize;

use super::raw::RawConfig;
use super::views::{BuildVocabConfig, LoadConfig, SplitConfig, TokenizeConfig, TrainConfig};
use super::ConfigError;

/// Stage identifiers the factory knows how to build a view for.
pub const SUPPORTED_STAGES: &[&str] = &[
    LoadConfig::STAGE,
    TokenizeConfig::STAGE,
    BuildVocabConfig::STAGE,
    SplitConfig::STAGE,
    TrainConfig::STAGE,
];

/// A resolved stage configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageConfig {
    Load(LoadConfig),
    Tokenize(TokenizeConfig),
    BuildVocab(BuildVocabConfig),
    Split(SplitConfig),
    Train(TrainConfig),
}

impl StageConfig {
    pub fn stage_name(&self) -> &'static str {
        match self {
            StageConfig::Load(_) => LoadConfig::STAGE,
            StageConfig::Tokenize(_) => TokenizeConfig::STAGE,
            StageConfig::BuildVocab(_) => BuildVocabConfig::STAGE,
            StageConfig::Split(_) => SplitConfig::STAGE,
            StageConfig::Train(_) => TrainConfig::STAGE,
        }
    }
}

/// Produces typed stage views over one raw document.
///
/// A missing key yields [`ConfigError::Missing`], which callers may treat as
/// "skip this stage". Asking for a stage the factory does not know yields
/// [`ConfigError::UnsupportedStage`], which is never recoverable.
#[derive(Debug, Clone)]
pub struct ConfigFactory {
    raw: RawConfig,
}

impl ConfigFactory {
    pub fn new(raw: RawConfig) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &RawConfig {
        &self.raw
    }

    /// Builds the view for a stage given by name.
    pub fn build_for(&self, stage: &str) -> Result<StageConfig, ConfigError> {
        match stage {
            LoadConfig::STAGE => self.load().map(StageConfig::Load),
            TokenizeConfig::STAGE => self.tokenize().map(StageConfig::Tokenize),
            BuildVocabConfig::STAGE => self.build_vocab().map(StageConfig::BuildVocab),
            SplitConfig::STAGE => self.split().map(StageConfig::Split),
            TrainConfig::STAGE => self.train().map(StageConfig::Train),
            other => Err(ConfigError::UnsupportedStage(other.to_string())),
        }
    }

    pub fn load(&self) -> Result<LoadConfig, ConfigError> {
        LoadConfig::from_raw(&self.raw)
    }

    pub fn tokenize(&self) -> Result<TokenizeConfig, ConfigError> {
        TokenizeConfig::from_raw(&self.raw)
    }

    pub fn build_vocab(&self) -> Result<BuildVocabConfig, ConfigError> {
        BuildVocabConfig::from_raw(&self.raw)
    }

    pub fn split(&self) -> Result<SplitConfig, ConfigError> {
        SplitConfig::from_raw(&self.raw)
    }

    pub fn train(&self) -> Result<TrainConfig, ConfigError> {
        TrainConfig::from_raw(&self.raw)
    }
}
