//! The pipeline driver: resolves each requested stage's configuration and
//! runs the stages strictly one after another.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use super::options::{MissingConfigPolicy, PipelineOptions};
use crate::config::{ConfigError, ConfigFactory, RawConfig, StageConfig};
use crate::error::PipelineError;
use crate::runner::{CommandRunner, SubprocessRunner};
use crate::stages::{BuildVocab, LoadAndPreprocess, Split, Stage, StageKind, Tokenize};

/// What happened to each requested stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Stages that ran to completion, in order.
    pub executed: Vec<StageKind>,
    /// Stages skipped because their configuration was missing.
    pub skipped: Vec<StageKind>,
}

/// A stage as seen by a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStage {
    pub stage: StageKind,
    /// The resolved configuration, `None` when the stage would be skipped.
    pub config: Option<StageConfig>,
    /// Why the stage would be skipped.
    pub skip_reason: Option<String>,
}

/// Runs the configured stages in canonical order.
pub struct Pipeline {
    factory: ConfigFactory,
    options: PipelineOptions,
    runner: Arc<dyn CommandRunner>,
}

impl Pipeline {
    /// Creates a pipeline that launches real subprocesses.
    pub fn new(raw: RawConfig, options: PipelineOptions) -> Self {
        Self {
            factory: ConfigFactory::new(raw),
            options,
            runner: Arc::new(SubprocessRunner::new()),
        }
    }

    /// Loads the configuration file and creates the pipeline.
    pub fn from_file(path: impl AsRef<Path>, options: PipelineOptions) -> Result<Self, PipelineError> {
        let raw = RawConfig::from_file(path)?;
        Ok(Self::new(raw, options))
    }

    /// Replaces the command runner.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Stages this pipeline will attempt, in order.
    pub fn stages(&self) -> Vec<StageKind> {
        self.options.effective_stages()
    }

    pub fn factory(&self) -> &ConfigFactory {
        &self.factory
    }

    /// Builds the stage for `kind`, or `Ok(None)` when it is not configured
    /// and the policy allows skipping it.
    pub fn resolve(&self, kind: StageKind) -> Result<Option<Box<dyn Stage>>, PipelineError> {
        let built: Result<Box<dyn Stage>, ConfigError> = match kind {
            StageKind::Load => self
                .factory
                .load()
                .map(|c| Box::new(LoadAndPreprocess::new(c)) as Box<dyn Stage>),
            StageKind::Tokenize => self
                .factory
                .tokenize()
                .map(|c| Box::new(Tokenize::new(c)) as Box<dyn Stage>),
            StageKind::BuildVocab => self
                .factory
                .build_vocab()
                .map(|c| Box::new(BuildVocab::new(c)) as Box<dyn Stage>),
            StageKind::Split => self
                .factory
                .split()
                .map(|c| Box::new(Split::new(c)) as Box<dyn Stage>),
        };
        match built {
            Ok(stage) => Ok(Some(stage)),
            Err(err) => self.handle_missing(kind, err).map(|()| None),
        }
    }

    /// Resolves every stage without running anything.
    pub fn plan(&self) -> Result<Vec<PlannedStage>, PipelineError> {
        self.stages()
            .into_iter()
            .map(|kind| match self.factory.build_for(kind.as_str()) {
                Ok(config) => Ok(PlannedStage {
                    stage: kind,
                    config: Some(config),
                    skip_reason: None,
                }),
                Err(err) => {
                    let reason = err.to_string();
                    self.handle_missing(kind, err)?;
                    Ok(PlannedStage {
                        stage: kind,
                        config: None,
                        skip_reason: Some(reason),
                    })
                }
            })
            .collect()
    }

    /// Runs every effective stage to completion, stopping at the first
    /// failure.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        let experiment = self
            .factory
            .raw()
            .lookup("pipeline")
            .string_or(&["name"], "<unnamed>")
            .unwrap_or_else(|_| "<unnamed>".to_string());
        let span = info_span!("pipeline", experiment = %experiment);
        self.run_stages().instrument(span).await
    }

    async fn run_stages(&self) -> Result<PipelineReport, PipelineError> {
        let stages = self.stages();
        let names: Vec<&str> = stages.iter().map(StageKind::as_str).collect();
        info!("Pipeline steps: {}", names.join(", "));

        let mut report = PipelineReport::default();
        for (i, kind) in stages.into_iter().enumerate() {
            info!("{}) {}", i + 1, kind);
            let Some(stage) = self.resolve(kind)? else {
                report.skipped.push(kind);
                continue;
            };
            let kind = stage.kind();
            debug!(stage = %kind, "Running stage");
            stage
                .run(self.runner.as_ref())
                .await
                .map_err(|source| PipelineError::Stage {
                    stage: kind,
                    source,
                })?;
            report.executed.push(kind);
        }
        Ok(report)
    }

    /// Applies the missing-configuration policy. Only
    /// [`ConfigError::Missing`] can be skipped; every other error is fatal.
    fn handle_missing(&self, kind: StageKind, err: ConfigError) -> Result<(), PipelineError> {
        if !err.is_missing() {
            return Err(err.into());
        }
        match self.options.on_missing_config {
            MissingConfigPolicy::Skip => {
                warn!(stage = %kind, "{}, skipping stage", err);
                Ok(())
            }
            MissingConfigPolicy::Abort => Err(PipelineError::MissingConfig {
                stage: kind,
                source: err,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::RecordingRunner;

    const SPLIT_AND_VOCAB: &str = r#"
name: exp
data:
  output_dir: /out
vocab:
  src: {save_to: src.vocab, files: [a.tok]}
splitting:
  files: [a.tok]
  parts: {test: 10}
  remain: train
  seed: 1
"#;

    fn pipeline(doc: &str, options: PipelineOptions) -> (Pipeline, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::default());
        let pipeline = Pipeline::new(RawConfig::from_yaml_str(doc).unwrap(), options)
            .with_runner(runner.clone());
        (pipeline, runner)
    }

    #[tokio::test]
    async fn test_missing_config_skipped_by_default() {
        let (pipeline, runner) = pipeline(SPLIT_AND_VOCAB, PipelineOptions::default());
        let report = pipeline.run().await.unwrap();
        assert_eq!(report.skipped, vec![StageKind::Load, StageKind::Tokenize]);
        assert_eq!(report.executed, vec![StageKind::BuildVocab, StageKind::Split]);

        let programs: Vec<String> = runner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, vec!["onmt-build-vocab", "python3"]);
    }

    #[tokio::test]
    async fn test_missing_config_abort() {
        let options = PipelineOptions::new().with_missing_config_policy(MissingConfigPolicy::Abort);
        let (pipeline, runner) = pipeline(SPLIT_AND_VOCAB, options);
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingConfig { stage: StageKind::Load, .. }
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_skip_option_omits_stage() {
        let options = PipelineOptions::new()
            .with_skip([StageKind::Load, StageKind::Tokenize, StageKind::Split])
            .with_missing_config_policy(MissingConfigPolicy::Abort);
        let (pipeline, runner) = pipeline(SPLIT_AND_VOCAB, options);
        let report = pipeline.run().await.unwrap();
        assert_eq!(report.executed, vec![StageKind::BuildVocab]);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_value_is_fatal_even_when_skipping() {
        let doc = SPLIT_AND_VOCAB.replace("seed: 1", "seed: not-a-number");
        let options = PipelineOptions::new().with_steps([StageKind::Split]);
        let (pipeline, _) = pipeline(&doc, options);
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_resolved_stage_matches_requested_kind() {
        let (pipeline, _) = pipeline(SPLIT_AND_VOCAB, PipelineOptions::default());
        for kind in [StageKind::BuildVocab, StageKind::Split] {
            let stage = pipeline.resolve(kind).unwrap().unwrap();
            assert_eq!(stage.kind(), kind);
        }
        assert!(pipeline.resolve(StageKind::Load).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stage_failure_attributed_to_stage() {
        let doc = format!("{}tools:\n  build_vocab: [sh, -c, \"exit 2\"]\n", SPLIT_AND_VOCAB);
        let dir = tempfile::TempDir::new().unwrap();
        let doc = doc.replace("/out", &dir.path().display().to_string());
        let options = PipelineOptions::new().with_steps([StageKind::BuildVocab]);
        let pipeline = Pipeline::new(RawConfig::from_yaml_str(&doc).unwrap(), options);
        std::fs::create_dir_all(dir.path().join("exp")).unwrap();

        let err = pipeline.run().await.unwrap_err();
        assert_eq!(err.stage(), Some(StageKind::BuildVocab));
        assert!(matches!(err, PipelineError::Stage { .. }));
    }

    #[test]
    fn test_plan_reports_skipped_stages() {
        let (pipeline, runner) = pipeline(SPLIT_AND_VOCAB, PipelineOptions::default());
        let plan = pipeline.plan().unwrap();
        assert_eq!(plan.len(), 4);
        assert!(plan[0].config.is_none());
        assert!(plan[0].skip_reason.as_deref().unwrap().contains("data.src_lgs"));
        assert!(plan[3].config.is_some());
        assert!(runner.calls().is_empty());
    }
}
